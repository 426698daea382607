use crate::quantity::{currency::Zlotys, energy::MegawattHours};

quantity!(MegawattHourPrice, via: f64, suffix: "PLN/MWh", precision: 2);

implement_mul!(MegawattHours, MegawattHourPrice, Zlotys);
