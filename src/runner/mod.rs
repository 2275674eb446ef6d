//! Script execution: the tree-walking interpreter, its built-ins and the
//! sandbox session that hosts it on a separate thread.

pub mod ds;
pub mod eval;
pub mod plugin;
pub mod sandbox;
pub mod std_lib;
