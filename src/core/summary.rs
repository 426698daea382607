use crate::{
    core::step::Step,
    quantity::energy::MegawattHours,
};

/// Totals over a track ledger.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TrackSummary {
    pub n_steps: usize,
    pub charge: MegawattHours,
    pub discharge: MegawattHours,
    pub conversion_loss: MegawattHours,
    pub idle_loss: MegawattHours,
    pub n_hit_max: usize,
    pub n_hit_min: usize,
}

impl<D> From<&[Step<D>]> for TrackSummary {
    fn from(steps: &[Step<D>]) -> Self {
        steps.iter().fold(Self::default(), |mut summary, step| {
            summary.n_steps += 1;
            summary.charge += step.charge_energy;
            summary.discharge += step.discharge_energy;
            summary.conversion_loss += step.conversion_loss;
            summary.idle_loss += step.idle_loss;
            summary.n_hit_max += usize::from(step.hit_capacity_max);
            summary.n_hit_min += usize::from(step.hit_capacity_min);
            summary
        })
    }
}

impl TrackSummary {
    pub fn total_loss(&self) -> MegawattHours {
        self.conversion_loss + self.idle_loss
    }
}
