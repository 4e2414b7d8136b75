//! The render pipeline: the interruptible work loop with its scheduler
//! bridge, the commit engine, and the microtask-batched sync queue.

pub(crate) mod commit;
pub(crate) mod sync_queue;
pub(crate) mod work_loop;
