pub mod meter_face;
pub mod status_bar;
