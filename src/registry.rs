//! Contract and service bindings for the server side.
//!
//! Bindings are explicit: every hosted contract is registered with a factory
//! at startup, then the registry is frozen. Lookups are cached, misses
//! included, for the registry's lifetime.

use crate::{
    codec::ArgFrame,
    contract::{Contract, ContractInfo},
    dispatcher::DispatchError,
};
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::{marker::PhantomData, sync::Arc};
use tracing::warn;

/// A freshly activated service, ready for exactly one call.
pub trait ServiceInstance: Send + Sync {
    fn contract(&self) -> &'static ContractInfo;

    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: ArgFrame,
    ) -> BoxFuture<'a, Result<Option<Bytes>, DispatchError>>;
}

/// Produces a new [`ServiceInstance`] per call.
pub trait Activator: Send + Sync {
    fn activate(&self) -> Box<dyn ServiceInstance>;
}

struct Factory<C: ?Sized, F> {
    factory: F,
    _contract: PhantomData<fn() -> Box<C>>,
}

impl<C, F> Activator for Factory<C, F>
where
    C: Contract + ?Sized,
    F: Fn() -> Box<C> + Send + Sync,
{
    fn activate(&self) -> Box<dyn ServiceInstance> {
        Box::new(Activated((self.factory)()))
    }
}

struct Activated<C: ?Sized>(Box<C>);

impl<C> ServiceInstance for Activated<C>
where
    C: Contract + ?Sized,
{
    fn contract(&self) -> &'static ContractInfo {
        C::info()
    }

    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: ArgFrame,
    ) -> BoxFuture<'a, Result<Option<Bytes>, DispatchError>> {
        C::dispatch(&self.0, method, args)
    }
}

#[derive(Clone)]
struct Binding {
    contract: &'static ContractInfo,
    activator: Arc<dyn Activator>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    contracts: Vec<&'static ContractInfo>,
    services: Vec<Binding>,
}

impl RegistryBuilder {
    /// Hosts contract `C`, activating a new service from `factory` on every
    /// call:
    ///
    /// ```ignore
    /// builder.register::<dyn Greeter, _>(|| Box::new(GreeterService));
    /// ```
    ///
    /// Only the first registration for a contract is used.
    pub fn register<C, F>(mut self, factory: F) -> Self
    where
        C: Contract + ?Sized,
        F: Fn() -> Box<C> + Send + Sync + 'static,
    {
        let contract = C::info();
        if self.services.iter().any(|b| b.contract.name == contract.name) {
            warn!(contract = contract.name, "contract already has a service, ignoring");
            return self;
        }
        self = self.declare::<C>();
        self.services.push(Binding {
            contract,
            activator: Arc::new(Factory {
                factory,
                _contract: PhantomData,
            }),
        });
        self
    }

    /// Makes contract `C` resolvable by name without hosting a service for
    /// it. Calls to it answer "not found".
    pub fn declare<C>(mut self) -> Self
    where
        C: Contract + ?Sized,
    {
        let contract = C::info();
        if !self.contracts.iter().any(|c| c.name == contract.name) {
            self.contracts.push(contract);
        }
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            contracts: self.contracts,
            services: self.services,
            contract_cache: DashMap::new(),
            service_cache: DashMap::new(),
        }
    }
}

pub struct ServiceRegistry {
    contracts: Vec<&'static ContractInfo>,
    services: Vec<Binding>,
    contract_cache: DashMap<String, Option<&'static ContractInfo>>,
    service_cache: DashMap<&'static str, Option<Arc<dyn Activator>>>,
}

impl ServiceRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Case-insensitive lookup by fully-qualified contract name.
    pub fn resolve_contract(&self, name: &str) -> Option<&'static ContractInfo> {
        let key = name.to_ascii_lowercase();
        if let Some(hit) = self.contract_cache.get(&key) {
            return *hit;
        }
        *self.contract_cache.entry(key).or_insert_with(|| {
            self.contracts
                .iter()
                .copied()
                .find(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    /// Activator of the service bound to `contract`, if any.
    pub fn find_service(&self, contract: &ContractInfo) -> Option<Arc<dyn Activator>> {
        if let Some(hit) = self.service_cache.get(contract.name) {
            return hit.value().clone();
        }
        self.service_cache
            .entry(contract.name)
            .or_insert_with(|| {
                self.services
                    .iter()
                    .find(|b| b.contract.name == contract.name)
                    .map(|b| b.activator.clone())
            })
            .value()
            .clone()
    }

    /// Resolves `name` and activates a new instance of its service.
    pub fn create_instance(&self, name: &str) -> Option<Box<dyn ServiceInstance>> {
        let contract = self.resolve_contract(name)?;
        let activator = self.find_service(contract)?;
        Some(activator.activate())
    }

    pub fn contracts(&self) -> impl Iterator<Item = &'static ContractInfo> + '_ {
        self.contracts.iter().copied()
    }
}
