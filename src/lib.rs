pub mod config;
pub mod context;
pub mod countries;
pub mod errors;
pub mod gazetteer;
pub mod logging;
pub mod lookup;
pub mod names;
pub mod reconcile;
pub mod records;
pub mod secondary;
pub mod sparql;
