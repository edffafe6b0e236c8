pub mod budget;
pub mod schedule;
pub mod signal;
pub mod work_queue;

pub use budget::*;
pub use schedule::*;
pub use signal::*;
pub use work_queue::*;
