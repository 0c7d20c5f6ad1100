pub mod auth;
pub mod comment;
pub mod database;
pub mod feed;
pub mod follow;
pub mod like;
pub mod notification;
pub mod post;
pub mod user;

// 重新导出常用类型
pub use auth::{AuthService, CurrentUser};
pub use comment::CommentService;
pub use database::Database;
pub use feed::FeedService;
pub use follow::FollowService;
pub use like::LikeService;
pub use notification::NotificationService;
pub use post::PostService;
pub use user::UserService;
