mod reconcile;

pub use reconcile::run;
