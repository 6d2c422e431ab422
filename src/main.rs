use std::net::{IpAddr, SocketAddr};

use axum::{
    Router,
    routing::{delete, get, post},
};
use backend::{AppState, config::Config, db, mailer::Mailer, routes};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 连接数据库并执行迁移
    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to connect to SQLite");
    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // SMTP 可选，未配置时发信路径只打日志
    let mailer = Mailer::from_config(&config);
    if mailer.is_none() {
        tracing::warn!("SMTP not configured, outgoing mail will be logged only");
    }

    let state = AppState {
        pool,
        config: config.clone(),
        mailer,
    };

    // 资源路由不挂认证中间件，创建者校验走请求体/请求头
    let router = Router::new()
        // 用户
        .route(
            "/users/{uid}",
            get(routes::user::get_user)
                .post(routes::user::upsert_user)
                .put(routes::user::update_user),
        )
        // 地图标记
        .route(
            "/pins",
            get(routes::pin::list_pins).post(routes::pin::create_pin),
        )
        // 活动
        .route(
            "/events",
            get(routes::event::list_events).post(routes::event::create_event),
        )
        .route("/events/{id}", delete(routes::event::delete_event))
        .route("/events/{id}/join", post(routes::event::join_event))
        .route("/events/{id}/accept", post(routes::event::accept_request))
        .route("/events/{id}/reject", post(routes::event::reject_request))
        .route("/events/{id}/requests", get(routes::event::list_requests))
        .route("/events/{id}/leave", post(routes::event::leave_event))
        .route("/events/{id}/close", post(routes::event::close_event))
        // 群聊
        .route("/chats/groups/{user_id}", get(routes::chat::chats_for_user))
        .route("/chats/{id}", get(routes::chat::get_chat_for_event))
        .route(
            "/chats/{id}/messages",
            get(routes::chat::get_messages).post(routes::chat::send_message),
        )
        .route("/chats/{id}/details", get(routes::chat::chat_details))
        // 私聊
        .route("/chats/direct", post(routes::direct::create_direct_chat))
        .route(
            "/chats/direct/user/{user_id}",
            get(routes::direct::chats_for_user),
        )
        .route(
            "/chats/direct/{chat_id}/messages",
            get(routes::direct::get_messages).post(routes::direct::send_message),
        )
        // 安全
        .route("/safety/alert", post(routes::safety::create_alert))
        .route("/safety/sos", post(routes::safety::sos))
        .route(
            "/safety/contacts/{id}",
            get(routes::safety::list_contacts)
                .post(routes::safety::add_contact)
                .delete(routes::safety::delete_contact),
        )
        // 认证
        .route("/auth/send-otp", post(routes::auth::send_otp))
        .route("/auth/verify-otp", post(routes::auth::verify_otp))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/session/{session_id}", get(routes::auth::get_session))
        // 任务
        .route("/quests", get(routes::quest::list_quests))
        .route("/quests/city/{city}", get(routes::quest::quests_for_city))
        .route("/quests/join", post(routes::quest::join_quest))
        .route("/quests/quit", post(routes::quest::quit_quest))
        .route("/quests/step/complete", post(routes::quest::complete_step))
        .route("/quests/active/{user_id}", get(routes::quest::active_quests))
        .route("/quests/progress/{user_id}", get(routes::quest::progress))
        .route(
            "/quests/progress/{user_id}/{quest_id}",
            get(routes::quest::progress_for_quest),
        );

    let app = router.layer(CorsLayer::permissive()).with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
