use utoipa::OpenApi;

use crate::routes::{account, chat, chats, health, title};

#[derive(OpenApi)]
#[openapi(info(
    title = "chatrelay-server",
    description = "Streaming chat relay with accounts and chat history",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(account::AccountApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(title::TitleApi::openapi());
    root.merge(chats::ChatsApi::openapi());
    root
}
