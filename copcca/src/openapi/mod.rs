//! OpenAPI document for the `/api/v1` surface, served at `/api/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::handlers;

/// Session tokens are accepted as a bearer header or as the session cookie.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session_token".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `/auth/signup` and `/auth/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_SESSION_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "session_cookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("copcca_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "COPCCA CRM API", description = "Customer, debt collection, messaging and subscription services"),
    servers((url = "/api/v1", description = "COPCCA API")),
    modifiers(&SessionSecurityAddon),
    paths(
        handlers::auth::signup,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::request_password_reset,
        handlers::auth::verify_reset_token,
        handlers::auth::update_password,
        handlers::auth::password_strength,
        handlers::auth::generate_password,
        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::profile::list_sessions,
        handlers::profile::revoke_other_sessions,
        handlers::profile::revoke_session,
        handlers::profile::list_audit_entries,
        handlers::currencies::list_currencies,
        handlers::currencies::convert,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::delete_user,
        handlers::users::list_team_members,
        handlers::records::list_records,
        handlers::records::create_record,
        handlers::records::update_record,
        handlers::records::delete_record,
        handlers::records::list_activities,
        handlers::records::debt_reminders,
        handlers::tasks::list_tasks,
        handlers::tasks::list_user_tasks,
        handlers::tasks::task_stats,
        handlers::tasks::create_task,
        handlers::tasks::update_task,
        handlers::tasks::update_task_status,
        handlers::tasks::delete_task,
        handlers::integrations::list_integrations,
        handlers::integrations::create_integration,
        handlers::integrations::update_integration,
        handlers::integrations::sync_integration,
        handlers::integrations::delete_integration,
        handlers::reports::list_reports,
        handlers::reports::get_report,
        handlers::reports::create_report,
        handlers::reports::update_report,
        handlers::reports::delete_report,
        handlers::ai_reports::list_ai_reports,
        handlers::ai_reports::save_ai_report,
        handlers::ai_reports::delete_ai_report,
        handlers::company::get_company_settings,
        handlers::company::update_company_settings,
        handlers::company::generate_invitation,
        handlers::company::email_invitation,
        handlers::company::verify_invitation,
        handlers::sms::get_sms_settings,
        handlers::sms::update_sms_settings,
        handlers::sms::get_sms_credits,
        handlers::sms::top_up_sms_credits,
        handlers::sms::send_sms,
        handlers::sms::send_bulk_sms,
        handlers::sms::send_debt_reminder,
        handlers::sms::send_payment_confirmation,
        handlers::sms::sms_stats,
        handlers::whatsapp::send_whatsapp,
        handlers::whatsapp::send_whatsapp_bulk,
        handlers::whatsapp::validate_whatsapp_number,
        handlers::whatsapp::send_whatsapp_template,
        handlers::subscriptions::list_plans,
        handlers::subscriptions::initialize_subscription,
        handlers::subscriptions::subscription_status,
        handlers::subscriptions::create_payment,
        handlers::subscriptions::list_payments,
        handlers::subscriptions::module_access,
        handlers::subscriptions::list_all_subscriptions,
        handlers::subscriptions::set_subscription_status,
        handlers::subscriptions::set_payment_status,
    ),
    tags(
        (name = "authentication", description = "Signup, login and password recovery"),
        (name = "profile", description = "The caller's profile, sessions and audit trail"),
        (name = "users", description = "Team user management"),
        (name = "records", description = "Per-user CRM collections and the activity feed"),
        (name = "tasks", description = "Team task assignment"),
        (name = "integrations", description = "Connected third-party services"),
        (name = "reports", description = "Reports with generated insights"),
        (name = "company", description = "Company settings and invitations"),
        (name = "sms", description = "SMS reminders and credits"),
        (name = "whatsapp", description = "WhatsApp relay"),
        (name = "subscriptions", description = "Plans, trials and payments"),
        (name = "currencies", description = "Currency conversion"),
        (name = "admin", description = "Platform operator endpoints"),
    )
)]
pub struct ApiDoc;
