//! Per-pair contact reporting.
//!
//! [`CollisionCallbackInfo::build`] turns a pair's manifold set into pooled
//! list elements, one per manifold. Every element carries a `next` link for
//! each body side, so both per-body chains see all manifolds while the pool
//! serves exactly one block per manifold. The elements borrow the manifolds
//! immutably for the lifetime of the info, which keeps them read-only while a
//! callback runs.

use super::contact::ContactManifold;
use super::pair::OverlappingPair;
use crate::{
    error::{CollisionError, Result},
    utils::{
        allocator::{PoolAllocator, PoolBox},
        arena::Handle,
        logging::ScopedTimer,
    },
};

/// Which body of the pair a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodySide {
    First,
    Second,
}

impl BodySide {
    pub const BOTH: [BodySide; 2] = [BodySide::First, BodySide::Second];

    fn slot(self) -> usize {
        match self {
            BodySide::First => 0,
            BodySide::Second => 1,
        }
    }
}

/// Pooled list node referencing one manifold of the pair.
#[derive(Debug)]
pub struct ContactManifoldListElement<'a> {
    manifold: &'a ContactManifold,
    next: [Option<usize>; 2],
}

impl<'a> ContactManifoldListElement<'a> {
    pub fn manifold(&self) -> &'a ContactManifold {
        self.manifold
    }

    /// Index of the following element in `side`'s chain.
    pub fn next_index(&self, side: BodySide) -> Option<usize> {
        self.next[side.slot()]
    }
}

/// Contact data handed to a [`CollisionCallback`] for one pair.
pub struct CollisionCallbackInfo<'a> {
    pool: &'a PoolAllocator,
    elements: Vec<Option<PoolBox<'a, ContactManifoldListElement<'a>>>>,
    heads: [Option<usize>; 2],
    bodies: [Handle; 2],
    proxies: [Handle; 2],
}

impl<'a> CollisionCallbackInfo<'a> {
    /// Allocates one element per manifold of `pair`, prepending each to both
    /// chains.
    ///
    /// Every manifold must hold at least one contact point. On error the
    /// elements built so far are released before returning.
    pub fn build(pair: &'a OverlappingPair, pool: &'a PoolAllocator) -> Result<Self> {
        let mut info = Self {
            pool,
            elements: Vec::with_capacity(pair.manifold_set.len()),
            heads: [None; 2],
            bodies: [pair.proxy_a.body, pair.proxy_b.body],
            proxies: [pair.proxy_a.id, pair.proxy_b.id],
        };

        for (index, manifold) in pair.manifold_set.iter().enumerate() {
            if manifold.is_empty() {
                return Err(CollisionError::EmptyManifold { index });
            }
            let element = pool.alloc_value(ContactManifoldListElement {
                manifold,
                next: info.heads,
            })?;
            let slot = info.elements.len();
            info.elements.push(Some(element));
            info.heads = [Some(slot); 2];
        }

        Ok(info)
    }

    pub fn body(&self, side: BodySide) -> Handle {
        self.bodies[side.slot()]
    }

    pub fn proxy_shape(&self, side: BodySide) -> Handle {
        self.proxies[side.slot()]
    }

    pub fn pool_id(&self) -> u64 {
        self.pool.id()
    }

    pub fn head(&self, side: BodySide) -> Option<&ContactManifoldListElement<'a>> {
        self.element(self.heads[side.slot()]?)
    }

    pub fn next(
        &self,
        element: &ContactManifoldListElement<'a>,
        side: BodySide,
    ) -> Option<&ContactManifoldListElement<'a>> {
        self.element(element.next_index(side)?)
    }

    pub fn elements(&self, side: BodySide) -> ContactManifoldChain<'_, 'a> {
        ContactManifoldChain {
            info: self,
            side,
            cursor: self.heads[side.slot()],
        }
    }

    /// Number of live elements (the length of each chain).
    pub fn len(&self) -> usize {
        self.elements.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every element back to the pool, walking the first body's
    /// chain, and returns how many were released.
    pub fn destroy(mut self) -> usize {
        self.release_elements()
    }

    fn element(&self, index: usize) -> Option<&ContactManifoldListElement<'a>> {
        self.elements.get(index)?.as_deref()
    }

    fn release_elements(&mut self) -> usize {
        let mut released = 0;
        let mut cursor = self.heads[BodySide::First.slot()];
        while let Some(index) = cursor {
            let Some(element) = self.elements.get_mut(index).and_then(Option::take) else {
                break;
            };
            cursor = element.next_index(BodySide::First);
            drop(element);
            released += 1;
        }
        // Anything a broken chain left behind.
        for element in self.elements.iter_mut().filter_map(Option::take) {
            drop(element);
            released += 1;
        }
        self.heads = [None; 2];
        released
    }
}

impl Drop for CollisionCallbackInfo<'_> {
    fn drop(&mut self) {
        self.release_elements();
    }
}

impl std::fmt::Debug for CollisionCallbackInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionCallbackInfo")
            .field("bodies", &self.bodies)
            .field("proxies", &self.proxies)
            .field("elements", &self.len())
            .finish()
    }
}

/// Read-only walk over one body's chain.
pub struct ContactManifoldChain<'i, 'a> {
    info: &'i CollisionCallbackInfo<'a>,
    side: BodySide,
    cursor: Option<usize>,
}

impl<'i, 'a> Iterator for ContactManifoldChain<'i, 'a> {
    type Item = &'i ContactManifoldListElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.info.element(self.cursor?)?;
        self.cursor = element.next_index(self.side);
        Some(element)
    }
}

/// Receives the contacts of each touching pair.
pub trait CollisionCallback {
    fn notify_contact(&mut self, info: &CollisionCallbackInfo<'_>);
}

/// Builds, reports and destroys one callback info per pair with manifolds.
/// Returns the number of pairs reported.
pub fn report_contacts(
    pairs: &[OverlappingPair],
    pool: &PoolAllocator,
    callback: &mut dyn CollisionCallback,
) -> Result<usize> {
    let _timer = ScopedTimer::with_items("callback::report_contacts", pairs.len());
    let mut reported = 0;
    for pair in pairs.iter().filter(|pair| pair.has_contacts()) {
        let info = CollisionCallbackInfo::build(pair, pool)?;
        callback.notify_contact(&info);
        info.destroy();
        reported += 1;
    }
    Ok(reported)
}
