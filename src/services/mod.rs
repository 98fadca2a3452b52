pub mod attachment_service;
pub mod conversation_service;
pub mod health_service;
pub mod message_service;
pub mod notification_service;
pub mod poll_gate;
pub mod poll_service;
pub mod presence_service;
pub mod typing_service;
