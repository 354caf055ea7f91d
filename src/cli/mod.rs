pub(crate) mod command;
pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod simulate;
pub(crate) mod types;
pub(crate) mod ui;

use std::io;

use anyhow::Result;
use serde::Serialize;

pub use self::command::{
    Args, Command, DecodeArgs, EncodeArgs, EventName, LinkArgs, LogLevel, OutputFormat, Scenario,
    SimulateArgs, UploadArgs,
};

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
