//! Composes the emails the booking workflow sends.
//!
//! Delivery goes through a `Notifier`; failures are logged and never fail
//! the operation that triggered them.

use std::sync::Arc;

use crate::config::Config;
use crate::domain::{Booking, BookingStatus, Infrastructure};
use crate::infra::Notifier;
use crate::jobs::EmailJob;

pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self { notifier, config }
    }

    async fn deliver(&self, email: EmailJob) {
        let to = email.to.clone();
        let subject = email.subject.clone();
        if let Err(e) = self.notifier.notify(email).await {
            tracing::warn!(to = %to, subject = %subject, error = %e, "Failed to schedule email");
        }
    }

    pub async fn email_verification(&self, to: &str, name: &str, token: &str) {
        let link = self.config.frontend_link("/verify-email", token);
        self.deliver(EmailJob::new(
            to,
            "Verify your email address",
            format!(
                "Hello {},\n\nPlease confirm your email address by opening the link below:\n\n{}\n\nIf you did not create an account you can ignore this message.\n",
                name, link
            ),
        ))
        .await;
    }

    pub async fn password_reset(&self, to: &str, token: &str) {
        let link = self.config.frontend_link("/reset-password", token);
        self.deliver(EmailJob::new(
            to,
            "Reset your password",
            format!(
                "A password reset was requested for this address.\n\nChoose a new password here:\n\n{}\n\nThe link expires in one hour. If you did not ask for a reset, no action is needed.\n",
                link
            ),
        ))
        .await;
    }

    pub async fn guest_confirmation(
        &self,
        to: &str,
        name: &str,
        token: &str,
        slot: &Booking,
        infrastructure: &Infrastructure,
    ) {
        let link = self.config.frontend_link("/guest-booking/confirm", token);
        self.deliver(EmailJob::new(
            to,
            format!("Confirm your booking request for {}", infrastructure.name),
            format!(
                "Hello {},\n\nYou asked to book {} on {}.\nConfirm the request here:\n\n{}\n\nThe timeslot is not reserved until you confirm.\n",
                name,
                infrastructure.name,
                describe_slot(slot),
                link
            ),
        ))
        .await;
    }

    pub async fn booking_requested(
        &self,
        manager_email: &str,
        booking: &Booking,
        infrastructure: &Infrastructure,
        approve_token: &str,
        reject_token: &str,
    ) {
        let approve = self.config.frontend_link("/booking-action", approve_token);
        let reject = self.config.frontend_link("/booking-action", reject_token);
        self.deliver(EmailJob::new(
            manager_email,
            format!("New booking request for {}", infrastructure.name),
            format!(
                "{} requested {} on {}.\nPurpose: {}\n\nApprove: {}\nReject: {}\n",
                booking.user_email.as_deref().unwrap_or("A user"),
                infrastructure.name,
                describe_slot(booking),
                booking.purpose.as_deref().unwrap_or("-"),
                approve,
                reject
            ),
        ))
        .await;
    }

    pub async fn booking_status_changed(&self, to: &str, booking: &Booking, auto_rejected: bool) {
        self.deliver(status_email(to, booking, auto_rejected)).await;
    }
}

fn describe_slot(booking: &Booking) -> String {
    format!(
        "{} from {} to {}",
        booking.booking_date.format("%Y-%m-%d"),
        booking.start_time.format("%H:%M"),
        booking.end_time.format("%H:%M")
    )
}

fn status_email(to: &str, booking: &Booking, auto_rejected: bool) -> EmailJob {
    let headline = match booking.status {
        BookingStatus::Approved => "Your booking was approved",
        BookingStatus::Rejected => "Your booking was rejected",
        BookingStatus::Canceled => "Your booking was canceled",
        _ => "Your booking was updated",
    };
    let mut body = format!(
        "{}.\n\nBooking #{} on {}.\n",
        headline,
        booking.id,
        describe_slot(booking)
    );
    if auto_rejected {
        body.push_str("\nAnother request for an overlapping time was approved first.\n");
    }
    EmailJob::new(to, headline, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookingType;
    use crate::errors::AppError;
    use crate::infra::MockNotifier;
    use chrono::{NaiveDate, NaiveTime};

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: 12,
            infrastructure_id: 1,
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            booking_type: BookingType::Booking,
            status,
            user_email: Some("owner@example.com".to_string()),
            purpose: Some("Imaging".to_string()),
        }
    }

    #[test]
    fn test_status_email_mentions_slot_and_reason() {
        let email = status_email("owner@example.com", &booking(BookingStatus::Rejected), true);
        assert_eq!(email.subject, "Your booking was rejected");
        assert!(email.body.contains("2026-11-02 from 09:00 to 10:30"));
        assert!(email.body.contains("overlapping"));
    }

    #[tokio::test]
    async fn test_verification_link_points_to_frontend() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|email| {
                email.to == "ada@example.com"
                    && email.body.contains("http://localhost:3000/verify-email?token=abc")
            })
            .times(1)
            .returning(|_| Ok(()));

        let notifications = Notifications::new(Arc::new(notifier), Config::for_tests());
        notifications
            .email_verification("ada@example.com", "Ada", "abc")
            .await;
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Err(AppError::internal("queue down")));

        let notifications = Notifications::new(Arc::new(notifier), Config::for_tests());
        notifications
            .booking_status_changed("owner@example.com", &booking(BookingStatus::Approved), false)
            .await;
    }
}
