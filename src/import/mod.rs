//! Importers that convert foreign mesh formats into hum containers.

pub mod cobalt;
