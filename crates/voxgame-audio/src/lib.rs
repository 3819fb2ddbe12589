pub mod capture;
pub mod device;
pub mod queue;
pub mod source;

pub use capture::{CaptureNode, PcmFramer};
pub use device::{CaptureFormat, DeviceManager};
pub use queue::{ChunkProducer, ChunkQueue, Chunks};
pub use source::AudioSource;

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Create a ring buffer split into producer and consumer halves.
pub fn create_ring_buffer<T>(capacity: usize) -> (HeapProd<T>, HeapCons<T>) {
    HeapRb::<T>::new(capacity).split()
}
