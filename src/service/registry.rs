use super::MethodHandler;
use log::debug;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("service table full ({0} entries)")]
    ServicesFull(usize),
    #[error("service 0x{0:04x} already registered")]
    DuplicateService(u16),
    #[error("service 0x{0:04x} not registered")]
    UnknownService(u16),
    #[error("method table of service 0x{0:04x} full")]
    MethodsFull(u16),
    #[error("method 0x{1:04x} already registered on service 0x{0:04x}")]
    DuplicateMethod(u16, u16),
    #[error("method 0x{1:04x} not registered on service 0x{0:04x}")]
    UnknownMethod(u16, u16),
}

pub struct LocalMethod {
    pub method_id: u16,
    pub handler: Arc<dyn MethodHandler>,
}

impl fmt::Debug for LocalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMethod")
            .field("method_id", &self.method_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct LocalService {
    pub service_id: u16,
    pub instance_id: u16,
    pub interface_version: u8,
    /// Unicast port the service is reachable on.
    pub port: u16,
    methods: Vec<LocalMethod>,
}

impl LocalService {
    pub fn methods(&self) -> &[LocalMethod] {
        &self.methods
    }

    pub fn find_method(&self, method_id: u16) -> Option<&Arc<dyn MethodHandler>> {
        self.methods
            .iter()
            .find(|m| m.method_id == method_id)
            .map(|m| &m.handler)
    }
}

/// Bounded table of the services this node provides.
#[derive(Debug)]
pub struct LocalServiceRegistry {
    services: Vec<LocalService>,
    max_services: usize,
    max_methods: usize,
}

impl LocalServiceRegistry {
    pub fn new(max_services: usize, max_methods: usize) -> Self {
        LocalServiceRegistry {
            services: Vec::with_capacity(max_services),
            max_services,
            max_methods,
        }
    }

    pub fn services(&self) -> &[LocalService] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn add_service(
        &mut self,
        service_id: u16,
        instance_id: u16,
        interface_version: u8,
        port: u16,
    ) -> Result<(), RegistryError> {
        if self.services.len() >= self.max_services {
            return Err(RegistryError::ServicesFull(self.max_services));
        }
        if self.find_service(service_id).is_some() {
            return Err(RegistryError::DuplicateService(service_id));
        }

        self.services.push(LocalService {
            service_id,
            instance_id,
            interface_version,
            port,
            methods: Vec::with_capacity(self.max_methods),
        });
        debug!(target: "someip::service", "added service 0x{:04x}.{:04x} v{} on port {}",
            service_id, instance_id, interface_version, port);
        Ok(())
    }

    /// Removes the service matching all three keys.
    pub fn remove_service(
        &mut self,
        service_id: u16,
        instance_id: u16,
        interface_version: u8,
    ) -> Result<LocalService, RegistryError> {
        let index = self
            .services
            .iter()
            .position(|s| {
                s.service_id == service_id
                    && s.instance_id == instance_id
                    && s.interface_version == interface_version
            })
            .ok_or(RegistryError::UnknownService(service_id))?;
        Ok(self.services.remove(index))
    }

    pub fn add_method(
        &mut self,
        service_id: u16,
        method_id: u16,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<(), RegistryError> {
        let max_methods = self.max_methods;
        let service = self
            .find_service_mut(service_id)
            .ok_or(RegistryError::UnknownService(service_id))?;
        if service.find_method(method_id).is_some() {
            return Err(RegistryError::DuplicateMethod(service_id, method_id));
        }
        if service.methods.len() >= max_methods {
            return Err(RegistryError::MethodsFull(service_id));
        }

        service.methods.push(LocalMethod { method_id, handler });
        Ok(())
    }

    pub fn remove_method(&mut self, service_id: u16, method_id: u16) -> Result<(), RegistryError> {
        let service = self
            .find_service_mut(service_id)
            .ok_or(RegistryError::UnknownService(service_id))?;
        let index = service
            .methods
            .iter()
            .position(|m| m.method_id == method_id)
            .ok_or(RegistryError::UnknownMethod(service_id, method_id))?;
        service.methods.remove(index);
        Ok(())
    }

    pub fn find_service(&self, service_id: u16) -> Option<&LocalService> {
        self.find_service_matching(service_id, None, None)
    }

    /// First service with `service_id` that also matches the optional port and interface version.
    pub fn find_service_matching(
        &self,
        service_id: u16,
        port: Option<u16>,
        interface_version: Option<u8>,
    ) -> Option<&LocalService> {
        self.services.iter().find(|s| {
            s.service_id == service_id
                && port.is_none_or(|p| s.port == p)
                && interface_version.is_none_or(|v| s.interface_version == v)
        })
    }

    fn find_service_mut(&mut self, service_id: u16) -> Option<&mut LocalService> {
        self.services.iter_mut().find(|s| s.service_id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ReturnCode;
    use crate::message::MessageBuilder;
    use crate::service::Request;

    fn ok_handler() -> Arc<dyn MethodHandler> {
        Arc::new(|_: &Request<'_>, _: &mut MessageBuilder| ReturnCode::Ok)
    }

    #[test]
    fn test_service_table_bounds() {
        let mut registry = LocalServiceRegistry::new(2, 1);
        registry.add_service(0x0001, 1, 1, 5005).unwrap();

        assert_eq!(
            registry.add_service(0x0001, 2, 3, 5006),
            Err(RegistryError::DuplicateService(0x0001))
        );
        registry.add_service(0x0002, 1, 1, 5005).unwrap();
        assert_eq!(
            registry.add_service(0x0003, 1, 1, 5005),
            Err(RegistryError::ServicesFull(2))
        );
    }

    #[test]
    fn test_method_table_bounds() {
        let mut registry = LocalServiceRegistry::new(1, 2);
        assert_eq!(
            registry.add_method(0x0001, 1, ok_handler()),
            Err(RegistryError::UnknownService(0x0001))
        );

        registry.add_service(0x0001, 1, 1, 5005).unwrap();
        registry.add_method(0x0001, 1, ok_handler()).unwrap();
        assert_eq!(
            registry.add_method(0x0001, 1, ok_handler()),
            Err(RegistryError::DuplicateMethod(0x0001, 1))
        );
        registry.add_method(0x0001, 2, ok_handler()).unwrap();
        assert_eq!(
            registry.add_method(0x0001, 3, ok_handler()),
            Err(RegistryError::MethodsFull(0x0001))
        );

        registry.remove_method(0x0001, 1).unwrap();
        assert!(registry.find_service(0x0001).unwrap().find_method(1).is_none());
        assert_eq!(
            registry.remove_method(0x0001, 1),
            Err(RegistryError::UnknownMethod(0x0001, 1))
        );
    }

    #[test]
    fn test_find_service_matching_keys() {
        let mut registry = LocalServiceRegistry::new(4, 4);
        registry.add_service(0x0007, 1, 2, 5005).unwrap();

        assert!(registry.find_service_matching(0x0007, Some(5005), Some(2)).is_some());
        assert!(registry.find_service_matching(0x0007, None, Some(1)).is_none());
        assert!(registry.find_service_matching(0x0007, Some(6000), None).is_none());
        assert!(registry.find_service_matching(0x0008, None, None).is_none());
    }

    #[test]
    fn test_remove_service_needs_exact_match() {
        let mut registry = LocalServiceRegistry::new(4, 4);
        registry.add_service(0x0007, 1, 2, 5005).unwrap();

        assert!(registry.remove_service(0x0007, 1, 1).is_err());
        let removed = registry.remove_service(0x0007, 1, 2).unwrap();
        assert_eq!(removed.service_id, 0x0007);
        assert!(registry.is_empty());
    }
}
