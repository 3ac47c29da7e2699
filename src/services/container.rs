//! Service container - one place to reach every application service.

use std::sync::Arc;

use super::{
    AuthService, Authenticator, BookingManager, BookingService, GuestBookingManager,
    GuestBookingService, InfrastructureManager, InfrastructureService, Notifications,
    TimeslotManager, TimeslotService, UserManager, UserService,
};
use crate::config::Config;
use crate::infra::{Notifier, Persistence};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    fn infrastructures(&self) -> Arc<dyn InfrastructureService>;

    fn timeslots(&self) -> Arc<dyn TimeslotService>;

    fn bookings(&self) -> Arc<dyn BookingService>;

    fn guests(&self) -> Arc<dyn GuestBookingService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    infrastructure_service: Arc<dyn InfrastructureService>,
    timeslot_service: Arc<dyn TimeslotService>,
    booking_service: Arc<dyn BookingService>,
    guest_service: Arc<dyn GuestBookingService>,
}

impl Services {
    /// Wire every service on top of one database connection.
    pub fn from_connection(
        db: Arc<sea_orm::DatabaseConnection>,
        config: Config,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let uow = Arc::new(Persistence::from_shared(db));
        let notifications = Arc::new(Notifications::new(notifier, config.clone()));

        Self {
            auth_service: Arc::new(Authenticator::new(
                uow.clone(),
                config,
                notifications.clone(),
            )),
            user_service: Arc::new(UserManager::new(uow.clone())),
            infrastructure_service: Arc::new(InfrastructureManager::new(uow.clone())),
            timeslot_service: Arc::new(TimeslotManager::new(uow.clone())),
            booking_service: Arc::new(BookingManager::new(uow.clone(), notifications.clone())),
            guest_service: Arc::new(GuestBookingManager::new(uow, notifications)),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn infrastructures(&self) -> Arc<dyn InfrastructureService> {
        self.infrastructure_service.clone()
    }

    fn timeslots(&self) -> Arc<dyn TimeslotService> {
        self.timeslot_service.clone()
    }

    fn bookings(&self) -> Arc<dyn BookingService> {
        self.booking_service.clone()
    }

    fn guests(&self) -> Arc<dyn GuestBookingService> {
        self.guest_service.clone()
    }
}
