use std::ops::Div;

use crate::quantity::{power::Megawatts, time::Hours};

quantity!(MegawattHours, via: f64, suffix: "MWh", precision: 3);

impl Div<Hours> for MegawattHours {
    type Output = Megawatts;

    fn div(self, hours: Hours) -> Self::Output {
        Megawatts(self.0 / hours.0)
    }
}
