mod catalogue_view;
mod frame_view;
mod painter;
mod simulation_view;

pub(crate) use self::catalogue_view::CatalogueView;
pub(crate) use self::frame_view::{DecodeView, EncodeView};
pub(crate) use self::painter::Painter;
pub(crate) use self::simulation_view::SimulationView;
