use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub body: String,
}
