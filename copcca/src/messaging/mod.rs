//! Outbound customer messaging: SMS through per-team Twilio credentials and WhatsApp through the
//! platform's Twilio WhatsApp sender.

pub mod sms;
pub mod twilio;
pub mod whatsapp;
