mod actions;
mod naming;
mod namespaces;
mod reconcile;

pub use reconcile::run;
