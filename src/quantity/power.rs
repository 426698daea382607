use crate::quantity::{energy::MegawattHours, time::Hours};

quantity!(Megawatts, via: f64, suffix: "MW", precision: 3);

implement_mul!(Megawatts, Hours, MegawattHours);
