//! Type-erased provider links stored in scope provider tables.

use crate::{downcast, share, DiError, DiResult, Instance, Key, Lifetime, Scope};

use super::Provider;

/// Uniform capability set over providers of any type.
pub(crate) trait Link: Send + Sync {
    fn lifetime(&self) -> Lifetime;

    /// Runs the create callback and wraps the value in its shared cell.
    fn create(&self, scope: &Scope) -> DiResult<Instance>;

    fn after_pointer_use(&self, scope: &Scope, instance: &Instance) -> DiResult<()>;

    /// Runs the free callback. The instance is already out of the cache.
    fn free(&self, scope: &Scope, instance: Instance) -> DiResult<()>;
}

pub(crate) struct ProviderLink<V> {
    key: Key,
    provider: Provider<V>,
}

impl<V> ProviderLink<V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn new(provider: Provider<V>) -> Self {
        Self {
            key: Key::of::<V>(),
            provider,
        }
    }
}

impl<V> Link for ProviderLink<V>
where
    V: Send + Sync + 'static,
{
    fn lifetime(&self) -> Lifetime {
        self.provider.lifetime
    }

    fn create(&self, scope: &Scope) -> DiResult<Instance> {
        let create = self
            .provider
            .create
            .as_ref()
            .ok_or(DiError::MissingCreate(self.key.name()))?;
        let value = create(scope)?;
        Ok(share(value))
    }

    fn after_pointer_use(&self, scope: &Scope, instance: &Instance) -> DiResult<()> {
        let Some(hook) = &self.provider.after_pointer_use else {
            return Ok(());
        };
        let shared = downcast::<V>(instance.clone()).ok_or(DiError::NotPointer(self.key.name()))?;
        let mut value = shared.write();
        hook(scope, &mut *value)
    }

    fn free(&self, scope: &Scope, instance: Instance) -> DiResult<()> {
        let Some(hook) = &self.provider.free else {
            return Ok(());
        };
        let shared = downcast::<V>(instance).ok_or(DiError::NotPointer(self.key.name()))?;
        let mut value = shared.write();
        hook(scope, &mut *value)
    }
}
