//! Chat endpoint

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::server::state::AppState;
use crate::types::{ChatForm, ChatResponse};

/// Answer for blank or unreadable messages
pub const INVALID_QUESTION: &str = "Please enter a valid question.";

/// `POST /chat`: always answers 200 with `{"response": ...}`
pub async fn chat(
    State(state): State<AppState>,
    form: Result<Form<ChatForm>, FormRejection>,
) -> Json<ChatResponse> {
    let message = match form {
        Ok(Form(form)) => form.message,
        Err(rejection) => {
            tracing::warn!("Unreadable chat form: {}", rejection);
            String::new()
        }
    };

    let message = message.trim();
    if message.is_empty() {
        tracing::warn!("Received empty message");
        return Json(ChatResponse::new(INVALID_QUESTION));
    }

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    let answer = async {
        tracing::info!("Received message: {}", message);
        let answer = state.pipeline().answer(message).await;
        tracing::info!("Response: {}", answer);
        answer
    }
    .instrument(span)
    .await;

    Json(ChatResponse::new(answer))
}
