pub mod arbi;
pub mod broker;
pub mod engine;
pub mod interval;
pub mod oze;
pub mod params;
pub mod series;
pub mod step;
pub mod summary;
pub mod track;

#[cfg(test)]
mod properties;
