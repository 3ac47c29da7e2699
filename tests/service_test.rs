//! Service tests over mocked repositories.
//!
//! The transactional paths (claiming, approving) are covered next to the
//! workflow with a mock database connection; these tests exercise the
//! checks services make before and around them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use mockall::predicate::eq;
use uuid::Uuid;

use infra_booking::config::Config;
use infra_booking::domain::{
    Actor, AnswerInput, AuthToken, Booking, BookingStatus, BookingType, Infrastructure,
    InfrastructureQuestion, Password, QuestionType, User, UserRole,
};
use infra_booking::errors::{AppError, AppResult};
use infra_booking::infra::{
    BookingRepository, InfrastructureRepository, MockBookingRepository,
    MockInfrastructureRepository, MockNotifier, MockQuestionRepository, MockTokenRepository,
    MockUserRepository, QuestionRepository, SweepOutcome, TokenRepository, TransactionContext,
    TxFuture, UnitOfWork, UserRepository,
};
use infra_booking::jobs::run_sweep;
use infra_booking::services::{
    AuthService, Authenticator, BookingManager, BookingQuery, BookingService,
    GuestBookingManager, GuestBookingRequest, GuestBookingService, InfrastructureManager,
    InfrastructureService, Notifications, TimeslotManager, TimeslotService, UserManager,
    UserService,
};
use infra_booking::types::PaginationParams;

// =============================================================================
// Test Unit of Work
// =============================================================================

/// Repository mocks to wire into a `TestUnitOfWork`
#[derive(Default)]
struct Repos {
    users: MockUserRepository,
    infrastructures: MockInfrastructureRepository,
    bookings: MockBookingRepository,
    questions: MockQuestionRepository,
    tokens: MockTokenRepository,
}

impl Repos {
    fn into_uow(self) -> Arc<TestUnitOfWork> {
        Arc::new(TestUnitOfWork {
            users: Arc::new(self.users),
            infrastructures: Arc::new(self.infrastructures),
            bookings: Arc::new(self.bookings),
            questions: Arc::new(self.questions),
            tokens: Arc::new(self.tokens),
        })
    }
}

/// Test mock for UnitOfWork that wraps the repository mocks
struct TestUnitOfWork {
    users: Arc<MockUserRepository>,
    infrastructures: Arc<MockInfrastructureRepository>,
    bookings: Arc<MockBookingRepository>,
    questions: Arc<MockQuestionRepository>,
    tokens: Arc<MockTokenRepository>,
}

#[async_trait]
impl UnitOfWork for TestUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn infrastructures(&self) -> Arc<dyn InfrastructureRepository> {
        self.infrastructures.clone()
    }

    fn bookings(&self) -> Arc<dyn BookingRepository> {
        self.bookings.clone()
    }

    fn questions(&self) -> Arc<dyn QuestionRepository> {
        self.questions.clone()
    }

    fn tokens(&self) -> Arc<dyn TokenRepository> {
        self.tokens.clone()
    }

    async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        // Transaction not supported in test mock
        Err(AppError::internal("Transactions not supported in test mock"))
    }

    async fn transaction_serializable<F, T>(&self, _f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        Err(AppError::internal("Transactions not supported in test mock"))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn user(email: &str, role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "hashed".to_string(),
        name: "Test User".to_string(),
        role,
        email_notifications: true,
        is_verified: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

fn actor(email: &str, role: UserRole) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role,
    }
}

fn infrastructure(id: i32) -> Infrastructure {
    Infrastructure {
        id,
        name: "Confocal microscope".to_string(),
        description: None,
        location: Some("Building B".to_string()),
        is_active: true,
        max_booking_duration: Some(240),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn slot(id: i32, infrastructure_id: i32, status: BookingStatus, owner: Option<&str>) -> Booking {
    let booking_type = if status == BookingStatus::Available {
        BookingType::Timeslot
    } else {
        BookingType::Booking
    };
    Booking {
        id,
        infrastructure_id,
        booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        booking_type,
        status,
        user_email: owner.map(str::to_string),
        purpose: None,
    }
}

fn required_question(id: i32, infrastructure_id: i32) -> InfrastructureQuestion {
    InfrastructureQuestion {
        id,
        infrastructure_id,
        question_text: "Sample type".to_string(),
        question_type: QuestionType::Text,
        is_required: true,
        options: vec![],
        display_order: 0,
    }
}

fn notifications(notifier: MockNotifier) -> Arc<Notifications> {
    Arc::new(Notifications::new(Arc::new(notifier), Config::for_tests()))
}

fn silent_notifications() -> Arc<Notifications> {
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().never();
    notifications(notifier)
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_me_for_deleted_account_is_unauthorized() {
    let mut repos = Repos::default();
    repos.users.expect_find_by_id().returning(|_| Ok(None));

    let service = UserManager::new(repos.into_uow());
    let result = service.me(actor("gone@uni.edu", UserRole::Student)).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_change_password_rejects_wrong_current_password() {
    let hash = Password::new("correct-horse").unwrap().into_string();
    let mut repos = Repos::default();
    repos.users.expect_find_by_id().returning(move |id| {
        let mut u = user("ada@uni.edu", UserRole::Student);
        u.id = id;
        u.password_hash = hash.clone();
        Ok(Some(u))
    });
    repos.users.expect_set_password().never();

    let service = UserManager::new(repos.into_uow());
    let result = service
        .change_password(
            actor("ada@uni.edu", UserRole::Student),
            "wrong-password".to_string(),
            "new-password-123".to_string(),
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
async fn test_update_profile_trims_name() {
    let mut repos = Repos::default();
    repos
        .users
        .expect_update_profile()
        .withf(|_, name, notifications| name.as_deref() == Some("Ada") && notifications.is_none())
        .times(1)
        .returning(|_, _, _| Ok(user("ada@uni.edu", UserRole::Student)));

    let service = UserManager::new(repos.into_uow());
    let result = service
        .update_profile(actor("ada@uni.edu", UserRole::Student), "  Ada ".to_string())
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_admin_cannot_delete_own_account() {
    let mut repos = Repos::default();
    repos.users.expect_delete().never();

    let admin = actor("admin@uni.edu", UserRole::Admin);
    let service = UserManager::new(repos.into_uow());
    let result = service.delete_user(admin.clone(), admin.id).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_role_change_requires_admin() {
    let mut repos = Repos::default();
    repos.users.expect_set_role().never();

    let service = UserManager::new(repos.into_uow());
    let result = service
        .set_role(
            actor("m@uni.edu", UserRole::Manager),
            Uuid::new_v4(),
            UserRole::Admin,
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

// =============================================================================
// Infrastructures
// =============================================================================

#[tokio::test]
async fn test_non_admins_only_list_active_infrastructures() {
    let mut repos = Repos::default();
    repos
        .infrastructures
        .expect_list()
        .with(eq(true))
        .times(1)
        .returning(|_| Ok(vec![infrastructure(1)]));

    let service = InfrastructureManager::new(repos.into_uow());
    let listed = service
        .list(actor("s@uni.edu", UserRole::Student))
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_assign_manager_requires_capable_role() {
    let mut repos = Repos::default();
    repos
        .infrastructures
        .expect_find_by_id()
        .returning(|id| Ok(Some(infrastructure(id))));
    repos
        .users
        .expect_find_by_id()
        .returning(|_| Ok(Some(user("student@uni.edu", UserRole::Student))));
    repos.infrastructures.expect_add_manager().never();

    let service = InfrastructureManager::new(repos.into_uow());
    let result = service
        .assign_manager(actor("admin@uni.edu", UserRole::Admin), 1, Uuid::new_v4())
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_question_of_another_infrastructure_is_not_found() {
    let mut repos = Repos::default();
    repos
        .questions
        .expect_find_by_id()
        .returning(|id| Ok(Some(required_question(id, 2))));
    repos.questions.expect_delete().never();

    let service = InfrastructureManager::new(repos.into_uow());
    let result = service
        .delete_question(actor("admin@uni.edu", UserRole::Admin), 1, 9)
        .await;

    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_unassigned_manager_cannot_add_questions() {
    let mut repos = Repos::default();
    repos
        .infrastructures
        .expect_is_manager()
        .returning(|_, _| Ok(false));
    repos.questions.expect_create().never();

    let service = InfrastructureManager::new(repos.into_uow());
    let result = service
        .create_question(
            actor("m@uni.edu", UserRole::Manager),
            1,
            infra_booking::domain::QuestionDraft {
                question_text: "Sample type".to_string(),
                question_type: QuestionType::Text,
                is_required: true,
                options: vec![],
                display_order: 0,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

// =============================================================================
// Timeslots
// =============================================================================

#[tokio::test]
async fn test_delete_timeslots_reports_skipped_ids() {
    let mut repos = Repos::default();
    repos.bookings.expect_find_by_id().returning(|id| match id {
        1 => Ok(Some(slot(1, 1, BookingStatus::Available, None))),
        3 => Ok(Some(slot(3, 2, BookingStatus::Available, None))),
        _ => Ok(None),
    });
    repos
        .infrastructures
        .expect_is_manager()
        .returning(|infrastructure_id, _| Ok(infrastructure_id == 1));
    repos
        .bookings
        .expect_delete_available_timeslot()
        .with(eq(1))
        .times(1)
        .returning(|_| Ok(true));

    let service = TimeslotManager::new(repos.into_uow());
    let outcome = service
        .delete_timeslots(actor("m@uni.edu", UserRole::Manager), vec![1, 2, 3])
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec![1]);
    assert_eq!(outcome.not_deleted, vec![2, 3]);
}

#[tokio::test]
async fn test_available_timeslots_of_unknown_infrastructure() {
    let mut repos = Repos::default();
    repos.infrastructures.expect_find_by_id().returning(|_| Ok(None));
    repos.bookings.expect_available_timeslots().never();

    let service = TimeslotManager::new(repos.into_uow());
    let result = service.available_timeslots(42).await;

    assert!(matches!(result, Err(AppError::NotFound)));
}

// =============================================================================
// Bookings
// =============================================================================

#[tokio::test]
async fn test_stranger_cannot_view_booking() {
    let mut repos = Repos::default();
    repos
        .bookings
        .expect_find_by_id()
        .returning(|id| Ok(Some(slot(id, 1, BookingStatus::Pending, Some("owner@uni.edu")))));
    repos.questions.expect_answers_for().never();

    let service = BookingManager::new(repos.into_uow(), silent_notifications());
    let result = service
        .get_booking(actor("other@uni.edu", UserRole::Student), 5)
        .await;

    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_manager_without_assignments_sees_no_bookings() {
    let mut repos = Repos::default();
    repos
        .infrastructures
        .expect_managed_by()
        .returning(|_| Ok(vec![]));
    repos.bookings.expect_list().never();

    let service = BookingManager::new(repos.into_uow(), silent_notifications());
    let (bookings, total) = service
        .list_bookings(
            actor("m@uni.edu", UserRole::Manager),
            BookingQuery::default(),
            PaginationParams::default(),
        )
        .await
        .unwrap();

    assert!(bookings.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_student_listing_is_scoped_to_own_email() {
    let mut repos = Repos::default();
    repos
        .bookings
        .expect_list()
        .withf(|filter, _| {
            filter.user_email.as_deref() == Some("ada@uni.edu")
                && filter.infrastructure_ids.is_none()
                && filter.booking_type == Some(BookingType::Booking)
        })
        .times(1)
        .returning(|_, _| Ok((vec![slot(5, 1, BookingStatus::Pending, Some("ada@uni.edu"))], 1)));

    let service = BookingManager::new(repos.into_uow(), silent_notifications());
    let (bookings, total) = service
        .list_bookings(
            actor("Ada@Uni.edu", UserRole::Student),
            BookingQuery::default(),
            PaginationParams::default(),
        )
        .await
        .unwrap();

    assert_eq!(bookings.len(), 1);
    assert_eq!(total, 1);
}

// =============================================================================
// Guest bookings
// =============================================================================

fn guest_request(answers: Vec<AnswerInput>) -> GuestBookingRequest {
    GuestBookingRequest {
        name: "Grace Guest".to_string(),
        email: " Guest@Lab.org ".to_string(),
        timeslot_id: 7,
        purpose: Some("Calibration".to_string()),
        answers,
    }
}

#[tokio::test]
async fn test_guest_cannot_start_on_claimed_slot() {
    let mut repos = Repos::default();
    repos
        .bookings
        .expect_find_by_id()
        .returning(|id| Ok(Some(slot(id, 1, BookingStatus::Pending, Some("x@uni.edu")))));
    repos.tokens.expect_issue().never();

    let service = GuestBookingManager::new(repos.into_uow(), silent_notifications());
    let result = service.start(guest_request(vec![])).await;

    assert!(matches!(result, Err(AppError::TimeslotUnavailable)));
}

#[tokio::test]
async fn test_guest_must_answer_required_questions() {
    let mut repos = Repos::default();
    repos
        .bookings
        .expect_find_by_id()
        .returning(|id| Ok(Some(slot(id, 1, BookingStatus::Available, None))));
    repos
        .questions
        .expect_list_for()
        .returning(|infrastructure_id| Ok(vec![required_question(3, infrastructure_id)]));
    repos.tokens.expect_issue().never();

    let service = GuestBookingManager::new(repos.into_uow(), silent_notifications());
    let result = service.start(guest_request(vec![])).await;

    match result {
        Err(AppError::MissingAnswers(ids)) => assert_eq!(ids, vec![3]),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_guest_start_issues_token_and_sends_confirmation() {
    let mut repos = Repos::default();
    repos
        .bookings
        .expect_find_by_id()
        .returning(|id| Ok(Some(slot(id, 1, BookingStatus::Available, None))));
    repos
        .questions
        .expect_list_for()
        .returning(|infrastructure_id| Ok(vec![required_question(3, infrastructure_id)]));
    repos
        .infrastructures
        .expect_find_by_id()
        .returning(|id| Ok(Some(infrastructure(id))));
    repos
        .tokens
        .expect_issue()
        .withf(|token| token.email == "guest@lab.org" && token.booking_id == Some(7))
        .times(1)
        .returning(|token| {
            Ok(AuthToken {
                id: 1,
                token: "guest-token".to_string(),
                purpose: token.purpose.as_str().to_string(),
                email: token.email,
                booking_id: token.booking_id,
                payload: token.payload,
                expires_at: token.expires_at,
                used_at: None,
            })
        });

    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|email| email.to == "guest@lab.org" && email.body.contains("guest-token"))
        .times(1)
        .returning(|_| Ok(()));

    let service = GuestBookingManager::new(repos.into_uow(), notifications(notifier));
    let started = service
        .start(guest_request(vec![AnswerInput {
            question_id: 3,
            answer_text: Some("Tissue".to_string()),
            document_path: None,
        }]))
        .await
        .unwrap();

    assert_eq!(started.timeslot_id, 7);
    assert_eq!(started.email, "guest@lab.org");
    assert!(started.expires_at > Utc::now() + Duration::hours(23));
}

// =============================================================================
// Authentication
// =============================================================================

fn authenticator(repos: Repos, notifier: MockNotifier) -> Authenticator<TestUnitOfWork> {
    Authenticator::new(repos.into_uow(), Config::for_tests(), notifications(notifier))
}

#[tokio::test]
async fn test_login_with_unknown_email_is_invalid_credentials() {
    let mut repos = Repos::default();
    repos.users.expect_find_by_email().returning(|_| Ok(None));

    let service = authenticator(repos, MockNotifier::new());
    let result = service
        .login("nobody@uni.edu".to_string(), "password123".to_string())
        .await;

    assert!(matches!(result, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
async fn test_login_requires_verified_email() {
    let hash = Password::new("password123").unwrap().into_string();
    let mut repos = Repos::default();
    repos
        .users
        .expect_find_by_email()
        .withf(|email| email == "ada@uni.edu")
        .returning(move |email| {
            let mut u = user(email, UserRole::Student);
            u.password_hash = hash.clone();
            u.is_verified = false;
            Ok(Some(u))
        });

    let service = authenticator(repos, MockNotifier::new());
    let result = service
        .login(" Ada@Uni.edu".to_string(), "password123".to_string())
        .await;

    assert!(matches!(result, Err(AppError::EmailNotVerified)));
}

#[tokio::test]
async fn test_login_issues_verifiable_token() {
    let hash = Password::new("password123").unwrap().into_string();
    let mut repos = Repos::default();
    repos.users.expect_find_by_email().returning(move |email| {
        let mut u = user(email, UserRole::Manager);
        u.password_hash = hash.clone();
        Ok(Some(u))
    });

    let service = authenticator(repos, MockNotifier::new());
    let issued = service
        .login("ada@uni.edu".to_string(), "password123".to_string())
        .await
        .unwrap();
    let claims = service.verify_token(&issued.access_token).unwrap();

    assert_eq!(claims.email, "ada@uni.edu");
    assert_eq!(claims.role, "manager");
}

/// Let `lead@uni.edu` log in as an admin; returns the account id.
fn stub_admin_login(repos: &mut Repos) -> Uuid {
    let admin = user("lead@uni.edu", UserRole::Admin);
    let id = admin.id;
    let hash = Password::new("password123").unwrap().into_string();
    repos.users.expect_find_by_email().returning(move |_| {
        let mut u = admin.clone();
        u.password_hash = hash.clone();
        Ok(Some(u))
    });
    id
}

#[tokio::test]
async fn test_authenticate_uses_stored_role() {
    let mut repos = Repos::default();
    let id = stub_admin_login(&mut repos);
    repos
        .users
        .expect_find_by_id()
        .with(eq(id))
        .returning(|id| {
            let mut demoted = user("lead@uni.edu", UserRole::Student);
            demoted.id = id;
            Ok(Some(demoted))
        });

    let service = authenticator(repos, MockNotifier::new());
    let issued = service
        .login("lead@uni.edu".to_string(), "password123".to_string())
        .await
        .unwrap();
    let current = service.authenticate(issued.access_token).await.unwrap();

    assert_eq!(current.id, id);
    assert_eq!(current.role, UserRole::Student);
}

#[tokio::test]
async fn test_authenticate_rejects_deleted_account() {
    let mut repos = Repos::default();
    stub_admin_login(&mut repos);
    // soft-deleted users are not returned by the active lookup
    repos.users.expect_find_by_id().returning(|_| Ok(None));

    let service = authenticator(repos, MockNotifier::new());
    let issued = service
        .login("lead@uni.edu".to_string(), "password123".to_string())
        .await
        .unwrap();
    let result = service.authenticate(issued.access_token).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_authenticate_rejects_forged_token() {
    let mut repos = Repos::default();
    repos.users.expect_find_by_id().never();

    let service = authenticator(repos, MockNotifier::new());
    let result = service.authenticate("not-a-jwt".to_string()).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_forgot_password_for_unknown_email_is_silent() {
    let mut repos = Repos::default();
    repos.users.expect_find_by_email().returning(|_| Ok(None));
    repos.tokens.expect_revoke_all().never();
    repos.tokens.expect_issue().never();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().never();

    let service = authenticator(repos, notifier);
    let result = service.forgot_password("nobody@uni.edu".to_string()).await;

    assert!(result.is_ok());
}

// =============================================================================
// Maintenance sweep
// =============================================================================

#[tokio::test]
async fn test_sweep_reports_counts() {
    let mut repos = Repos::default();
    repos.bookings.expect_sweep_elapsed().times(1).returning(|_| {
        Ok(SweepOutcome {
            expired: 2,
            completed: 1,
        })
    });
    repos.tokens.expect_purge().times(1).returning(|_| Ok(4));

    let uow = repos.into_uow();
    let report = run_sweep(uow.as_ref()).await.unwrap();

    assert_eq!(report.bookings.expired, 2);
    assert_eq!(report.bookings.completed, 1);
    assert_eq!(report.purged_tokens, 4);
}
