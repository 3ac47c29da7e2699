//! OpenAPI documentation served through Swagger UI.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, booking_handler, guest_handler, infrastructure_handler, upload_handler,
    user_handler,
};
use crate::domain::{
    AnswerInput, BookingAnswer, BookingResponse, BookingStatus, BookingType,
    InfrastructureQuestion, InfrastructureResponse, QuestionType, UserResponse, UserRole,
};
use crate::services::TokenResponse;
use crate::types::{BookingPage, MessageResponse, PaginationMeta, UserPage};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Infrastructure Booking API",
        version = "0.1.0",
        description = "Timeslots, booking requests and approvals for shared scientific infrastructure",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        auth_handler::register,
        auth_handler::login,
        auth_handler::verify_email,
        auth_handler::resend_verification,
        auth_handler::forgot_password,
        auth_handler::reset_password,
        user_handler::get_current_user,
        user_handler::update_profile,
        user_handler::update_email_preferences,
        user_handler::change_password,
        user_handler::list_users,
        user_handler::update_role,
        user_handler::delete_user,
        user_handler::restore_user,
        infrastructure_handler::list_active,
        infrastructure_handler::available_timeslots,
        infrastructure_handler::list_infrastructures,
        infrastructure_handler::list_managed,
        infrastructure_handler::get_infrastructure,
        infrastructure_handler::create_infrastructure,
        infrastructure_handler::update_infrastructure,
        infrastructure_handler::toggle_active,
        infrastructure_handler::delete_infrastructure,
        infrastructure_handler::list_managers,
        infrastructure_handler::assign_manager,
        infrastructure_handler::unassign_manager,
        infrastructure_handler::list_questions,
        infrastructure_handler::create_question,
        infrastructure_handler::update_question,
        infrastructure_handler::delete_question,
        booking_handler::create_timeslots,
        booking_handler::generate_timeslots,
        booking_handler::delete_timeslots,
        booking_handler::request_booking,
        booking_handler::list_bookings,
        booking_handler::my_bookings,
        booking_handler::get_booking,
        booking_handler::update_status,
        booking_handler::email_action,
        guest_handler::start_guest_booking,
        guest_handler::confirm_guest_booking,
        upload_handler::upload_document,
    ),
    components(
        schemas(
            UserRole,
            UserResponse,
            UserPage,
            InfrastructureResponse,
            InfrastructureQuestion,
            QuestionType,
            AnswerInput,
            BookingAnswer,
            BookingResponse,
            BookingPage,
            BookingStatus,
            BookingType,
            PaginationMeta,
            MessageResponse,
            TokenResponse,
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::TokenRequest,
            auth_handler::EmailRequest,
            auth_handler::ResetPasswordRequest,
            user_handler::UpdateProfileRequest,
            user_handler::EmailPreferencesRequest,
            user_handler::ChangePasswordRequest,
            user_handler::UpdateRoleRequest,
            infrastructure_handler::InfrastructureRequest,
            infrastructure_handler::AssignManagerRequest,
            infrastructure_handler::QuestionRequest,
            booking_handler::SlotInput,
            booking_handler::CreateTimeslotsRequest,
            booking_handler::GenerateTimeslotsRequest,
            booking_handler::GeneratedTimeslotsResponse,
            booking_handler::DeleteTimeslotsRequest,
            booking_handler::DeleteTimeslotsResponse,
            booking_handler::BookingRequestBody,
            booking_handler::UpdateStatusRequest,
            booking_handler::StatusChangeResponse,
            booking_handler::EmailActionRequest,
            booking_handler::BookingDetailsResponse,
            guest_handler::GuestBookingBody,
            guest_handler::GuestBookingStartedResponse,
            guest_handler::GuestConfirmRequest,
            upload_handler::UploadResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and account tokens"),
        (name = "Users", description = "Profiles and user administration"),
        (name = "Infrastructures", description = "Bookable infrastructures and their managers"),
        (name = "Questions", description = "Questions asked with every booking request"),
        (name = "Timeslots", description = "Publishing and withdrawing open timeslots"),
        (name = "Bookings", description = "Booking requests and status changes"),
        (name = "Guest bookings", description = "Requests from people without an account"),
        (name = "Uploads", description = "Documents attached to answers")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT obtained from /api/auth/login"))
                        .build(),
                ),
            );
        }
    }
}
