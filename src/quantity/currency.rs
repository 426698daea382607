quantity!(
    /// Polish złoty.
    Zlotys, via: f64, suffix: "PLN", precision: 2
);
