//! UI rendering modules.
//!
//! - `toolbar`: file menu, tools, slice / crop / cut, contours, blink
//! - `image_tabs`: one linked plot per image view
//! - `spectrum_panel`: "All" and per-aperture spectra, redshift prompt
//! - `status_bar`: load state, cursor readout, transient messages

mod image_tabs;
mod spectrum_panel;
mod status_bar;
mod toolbar;
