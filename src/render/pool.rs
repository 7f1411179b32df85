//! Bounded pool of drawing surfaces.
//!
//! Rendering a display tile needs a full-size RGBA buffer. The pool caps how
//! many exist at once: surfaces are created lazily up to the capacity and
//! reused afterwards. Waiters are served in arrival order by a fair
//! semaphore.
//!
//! A [`PooledSurface`] returns its slot when dropped, so the slot is
//! released on every exit path, including errors, panics and cancelled
//! futures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of surfaces.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Bounded, FIFO-fair pool of RGBA surfaces of one size.
pub struct SurfacePool {
    permits: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<RgbaImage>>>,
    width: u32,
    height: u32,
    capacity: usize,
    created: AtomicUsize,
}

impl SurfacePool {
    /// Create a pool of `capacity` surfaces of `width × height` pixels.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize, width: u32, height: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            width,
            height,
            capacity,
            created: AtomicUsize::new(0),
        }
    }

    /// Wait for a free surface.
    ///
    /// The surface is cleared to transparent. Returns `None` once the pool
    /// has been closed.
    pub async fn acquire(&self) -> Option<PooledSurface> {
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;

        let reused = lock(&self.idle).pop();
        let image = match reused {
            Some(mut image) => {
                clear(&mut image);
                image
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                RgbaImage::new(self.width, self.height)
            }
        };

        Some(PooledSurface {
            image,
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    /// Refuse new acquisitions and wake every waiter with `None`.
    ///
    /// Surfaces already handed out stay valid until dropped.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Surfaces not currently handed out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Surfaces allocated so far, never more than the capacity.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn lock(idle: &Mutex<Vec<RgbaImage>>) -> std::sync::MutexGuard<'_, Vec<RgbaImage>> {
    // A panic while holding the lock cannot leave the list inconsistent
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        *pixel = Rgba([0, 0, 0, 0]);
    }
}

// =============================================================================
// PooledSurface
// =============================================================================

/// A surface checked out of a [`SurfacePool`].
pub struct PooledSurface {
    image: RgbaImage,
    idle: Arc<Mutex<Vec<RgbaImage>>>,
    // Released after the image is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl PooledSurface {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }
}

impl Drop for PooledSurface {
    fn drop(&mut self) {
        let image = std::mem::take(&mut self.image);
        lock(&self.idle).push(image);
    }
}

// =============================================================================
// Tests
// =============================================================================
