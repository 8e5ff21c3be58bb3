use crate::model::{Service, ServiceList, Urn};
use dashmap::DashMap;
use log::*;

/// In-memory registry of producer services, keyed by producer URN.
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    services: DashMap<Urn, Service>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Insert or replace the registration for `urn`. The stored record always
    /// carries `urn`, whatever the submitted body said.
    pub fn register(&self, urn: Urn, mut service: Service) -> Service {
        service.urn = Some(urn.clone());
        if self.services.insert(urn.clone(), service.clone()).is_some() {
            debug!("Updated service registration for {urn}");
        } else {
            info!("Registered service {urn}");
        }
        service
    }

    pub fn deregister(&self, urn: &Urn) -> bool {
        let removed = self.services.remove(urn).is_some();
        if removed {
            info!("Deregistered service {urn}");
        }
        removed
    }

    pub fn get(&self, urn: &Urn) -> Option<Service> {
        self.services.get(urn).map(|entry| entry.clone())
    }

    /// All registered services, ordered by namespace then id.
    pub fn list(&self) -> ServiceList {
        let mut services: Vec<(Urn, Service)> = self
            .services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        services.sort_by(|(a, _), (b, _)| {
            (a.namespace.as_str(), a.id.as_str()).cmp(&(b.namespace.as_str(), b.id.as_str()))
        });

        ServiceList {
            services: services.into_iter().map(|(_, service)| service).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
