//! Backend local de la cola de tareas: corre cada tarea como un comando
//! de shell en un sandbox propio, limitado por un presupuesto de cores.

mod cache;
mod config;
mod pool;
mod sandbox;

pub use config::{default_cores, LocalQueueConfig};
pub use pool::LocalQueue;
