use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

use super::track::Track;

/// Everything a guild's playback decisions depend on.
///
/// Only ever touched through the `Mutex` handed out by [`TenantRegistry`], so
/// queue, target and connection always change together.
pub struct TenantState<C> {
    tenant: GuildId,
    pub(crate) queue: VecDeque<Track>,
    pub(crate) target_channel: Option<ChannelId>,
    pub(crate) connection: Option<Arc<C>>,
}

impl<C> TenantState<C> {
    pub fn new(tenant: GuildId) -> Self {
        Self {
            tenant,
            queue: VecDeque::new(),
            target_channel: None,
            connection: None,
        }
    }

    pub fn tenant(&self) -> GuildId {
        self.tenant
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn target_channel(&self) -> Option<ChannelId> {
        self.target_channel
    }

    pub fn connection(&self) -> Option<&Arc<C>> {
        self.connection.as_ref()
    }

    /// Nothing queued, nowhere to go, nothing held open.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.target_channel.is_none() && self.connection.is_none()
    }

    /// Drops queue, target and connection in one step.
    pub(crate) fn reset(&mut self) -> Option<Arc<C>> {
        self.queue.clear();
        self.target_channel = None;
        self.connection.take()
    }
}

pub type SharedTenant<C> = Arc<Mutex<TenantState<C>>>;

/// Process-wide guild -> state map. Entries are created lazily and may be evicted once idle.
pub struct TenantRegistry<C> {
    tenants: DashMap<GuildId, SharedTenant<C>>,
}

impl<C> TenantRegistry<C> {
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
        }
    }

    /// Lookup-or-create; concurrent callers for one guild get the same state.
    pub fn get_or_create(&self, tenant: GuildId) -> SharedTenant<C> {
        self.tenants
            .entry(tenant)
            .or_insert_with(|| {
                debug!("🆕 Creando estado de reproducción para guild {}", tenant);
                Arc::new(Mutex::new(TenantState::new(tenant)))
            })
            .clone()
    }

    pub fn get(&self, tenant: GuildId) -> Option<SharedTenant<C>> {
        self.tenants.get(&tenant).map(|entry| entry.clone())
    }

    /// Removes the guild's state if nobody holds its lock and it is idle.
    pub fn evict(&self, tenant: GuildId) -> bool {
        self.tenants
            .remove_if(&tenant, |_, state| {
                state.try_lock().map(|s| s.is_idle()).unwrap_or(false)
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

impl<C> Default for TenantRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
