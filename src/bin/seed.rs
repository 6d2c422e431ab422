//! 给本地开发灌演示数据：用户、图钉、活动、群聊和任务线。
//! 运行: cargo run --bin seed

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use backend::config::Config;
use backend::db;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url).await?;
    db::MIGRATOR.run(&pool).await?;

    clear(&pool).await?;
    seed_users(&pool).await?;
    seed_pins(&pool).await?;
    seed_events(&pool).await?;
    seed_quests(&pool).await?;

    tracing::info!("seeding complete");
    Ok(())
}

async fn clear(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // 顺序照外键依赖反着来
    for table in [
        "user_quest_progress",
        "user_active_quests",
        "quest_steps",
        "quests",
        "direct_messages",
        "direct_chats",
        "chat_messages",
        "group_chats",
        "event_requests",
        "event_participants",
        "travel_events",
        "destination_pins",
        "safety_alerts",
        "emergency_contacts",
        "user_sessions",
        "otp_codes",
        "users",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn seed_users(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let users = [
        ("user_alice", "alice@example.com", "Alice Explorer", 120),
        ("user_bob", "bob@example.com", "Bob The Builder", 50),
        ("user_mauryadoshi", "maurya@example.com", "Maurya", 0),
        ("user_josephvishal9", "vishal@example.com", "Vishal", 0),
    ];

    for (uid, email, name, points) in users {
        sqlx::query(
            "INSERT INTO users (uid, email, displayName, explorerPoints) VALUES (?, ?, ?, ?)",
        )
        .bind(uid)
        .bind(email)
        .bind(name)
        .bind(points)
        .execute(pool)
        .await?;
    }

    tracing::info!("users seeded");
    Ok(())
}

async fn seed_pins(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let pins = [
        ("Bangalore", 12.9716, 77.5946, 5),
        ("Paris", 48.8566, 2.3522, 120),
    ];

    for (city, lat, lng, visitors) in pins {
        sqlx::query(
            r#"
            INSERT INTO destination_pins (id, city, type, latitude, longitude, activeVisitorCount)
            VALUES (?, ?, 'point_of_interest', ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(city)
        .bind(lat)
        .bind(lng)
        .bind(visitors)
        .execute(pool)
        .await?;
    }

    tracing::info!("pins seeded");
    Ok(())
}

async fn seed_events(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let tomorrow = (Utc::now() + Duration::days(1)).to_rfc3339();
    let day_after = (Utc::now() + Duration::days(2)).to_rfc3339();
    let next_week = (Utc::now() + Duration::days(7)).to_rfc3339();

    struct DemoEvent {
        id: &'static str,
        city: &'static str,
        title: &'static str,
        event_date: String,
        is_date_flexible: bool,
        creator_id: &'static str,
        requires_approval: bool,
        category: &'static str,
    }

    let events = [
        DemoEvent {
            id: "event_blr_1",
            city: "Bangalore",
            title: "Koramangala Cafe Hopping",
            event_date: tomorrow.clone(),
            is_date_flexible: false,
            creator_id: "user_alice",
            requires_approval: false,
            category: "Food & Drinks",
        },
        DemoEvent {
            id: "event_blr_2",
            city: "Bangalore",
            title: "Cubbon Park Morning Run",
            event_date: tomorrow.clone(),
            is_date_flexible: true,
            creator_id: "user_bob",
            requires_approval: true,
            category: "Adventure",
        },
        DemoEvent {
            id: "event_blr_3",
            city: "Bangalore",
            title: "Nandi Hills Sunrise Trip",
            event_date: day_after.clone(),
            is_date_flexible: false,
            creator_id: "user_mauryadoshi",
            requires_approval: false,
            category: "Adventure",
        },
        DemoEvent {
            id: "event_mum_1",
            city: "Mumbai",
            title: "Marine Drive Evening Walk",
            event_date: tomorrow.clone(),
            is_date_flexible: true,
            creator_id: "user_josephvishal9",
            requires_approval: false,
            category: "Tours",
        },
        DemoEvent {
            id: "event_mum_2",
            city: "Mumbai",
            title: "Street Food Tour - Juhu Beach",
            event_date: day_after.clone(),
            is_date_flexible: false,
            creator_id: "user_alice",
            requires_approval: true,
            category: "Food & Drinks",
        },
        DemoEvent {
            id: "event_mum_3",
            city: "Mumbai",
            title: "Bollywood Studio Visit",
            event_date: next_week.clone(),
            is_date_flexible: true,
            creator_id: "user_bob",
            requires_approval: false,
            category: "Tours",
        },
        DemoEvent {
            id: "event_del_1",
            city: "Delhi",
            title: "Red Fort Heritage Walk",
            event_date: tomorrow.clone(),
            is_date_flexible: false,
            creator_id: "user_mauryadoshi",
            requires_approval: false,
            category: "Tours",
        },
        DemoEvent {
            id: "event_del_2",
            city: "Delhi",
            title: "Old Delhi Food Crawl",
            event_date: day_after.clone(),
            is_date_flexible: true,
            creator_id: "user_josephvishal9",
            requires_approval: true,
            category: "Food & Drinks",
        },
        DemoEvent {
            id: "event_goa_1",
            city: "Goa",
            title: "Beach Hopping - North Goa",
            event_date: next_week.clone(),
            is_date_flexible: true,
            creator_id: "user_alice",
            requires_approval: false,
            category: "Adventure",
        },
        DemoEvent {
            id: "event_goa_2",
            city: "Goa",
            title: "Saturday Night Party",
            event_date: next_week.clone(),
            is_date_flexible: false,
            creator_id: "user_bob",
            requires_approval: true,
            category: "Nightlife",
        },
    ];

    for event in &events {
        sqlx::query(
            r#"
            INSERT INTO travel_events
                (id, city, title, eventDate, isDateFlexible, creatorId, requiresApproval, category)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id)
        .bind(event.city)
        .bind(event.title)
        .bind(&event.event_date)
        .bind(event.is_date_flexible)
        .bind(event.creator_id)
        .bind(event.requires_approval)
        .bind(event.category)
        .execute(pool)
        .await?;

        sqlx::query("INSERT INTO group_chats (id, eventId) VALUES (?, ?)")
            .bind(format!("chat_{}", event.id))
            .bind(event.id)
            .execute(pool)
            .await?;

        // 创建者自动进参与者名单
        sqlx::query("INSERT INTO event_participants (eventId, userId) VALUES (?, ?)")
            .bind(event.id)
            .bind(event.creator_id)
            .execute(pool)
            .await?;
    }

    let participants = [
        ("event_blr_1", "user_bob"),
        ("event_blr_1", "user_mauryadoshi"),
        ("event_mum_1", "user_alice"),
    ];
    for (event_id, user_id) in participants {
        sqlx::query("INSERT INTO event_participants (eventId, userId) VALUES (?, ?)")
            .bind(event_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    let requests = [
        ("event_blr_2", "user_josephvishal9"),
        ("event_mum_2", "user_mauryadoshi"),
        ("event_del_2", "user_alice"),
    ];
    for (event_id, user_id) in requests {
        sqlx::query("INSERT INTO event_requests (eventId, userId) VALUES (?, ?)")
            .bind(event_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    let now = Utc::now().to_rfc3339();
    let messages = [
        ("msg_1", "user_bob", "Hey! Excited for tomorrow!"),
        ("msg_2", "user_mauryadoshi", "Same here! Should we meet at Third Wave?"),
        ("msg_3", "user_alice", "Sounds good! Let's finalize the route."),
    ];
    for (id, sender, text) in messages {
        sqlx::query(
            "INSERT INTO chat_messages (id, chatId, senderId, text, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind("chat_event_blr_1")
        .bind(sender)
        .bind(text)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    tracing::info!(count = events.len(), "events seeded");
    Ok(())
}

async fn seed_quests(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    struct DemoQuest {
        id: &'static str,
        city: &'static str,
        title: &'static str,
        description: &'static str,
        reward: &'static str,
        reward_points: i64,
        steps: &'static [(&'static str, f64, f64)],
    }

    let quests = [
        DemoQuest {
            id: "quest_blr_heritage",
            city: "Bangalore",
            title: "Heritage Trail",
            description: "Walk through the oldest corners of the city.",
            reward: "500 XP",
            reward_points: 500,
            steps: &[
                ("Visit Bangalore Palace", 12.9988, 77.5921),
                ("Explore Tipu Sultan's Summer Palace", 12.9594, 77.5738),
                ("Finish at Cubbon Park bandstand", 12.9763, 77.5929),
            ],
        },
        DemoQuest {
            id: "quest_blr_coffee",
            city: "Bangalore",
            title: "Filter Coffee Crawl",
            description: "Taste the classics, old and new.",
            reward: "300 XP",
            reward_points: 300,
            steps: &[
                ("Morning brew at a darshini", 12.9352, 77.6245),
                ("Third-wave roastery stop", 12.9719, 77.6412),
            ],
        },
        DemoQuest {
            id: "quest_goa_shores",
            city: "Goa",
            title: "Northern Shores",
            description: "Three beaches before sunset.",
            reward: "750 XP",
            reward_points: 750,
            steps: &[
                ("Sunrise at Morjim", 15.6311, 73.7324),
                ("Lunch shack at Anjuna", 15.5735, 73.7407),
                ("Sunset at Vagator", 15.5986, 73.7444),
            ],
        },
    ];

    for quest in &quests {
        sqlx::query(
            r#"
            INSERT INTO quests (id, city, title, description, reward, rewardPoints)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quest.id)
        .bind(quest.city)
        .bind(quest.title)
        .bind(quest.description)
        .bind(quest.reward)
        .bind(quest.reward_points)
        .execute(pool)
        .await?;

        for (order, (title, lat, lng)) in quest.steps.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quest_steps (id, questId, stepOrder, title, latitude, longitude)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(format!("{}_step_{}", quest.id, order + 1))
            .bind(quest.id)
            .bind((order + 1) as i64)
            .bind(title)
            .bind(lat)
            .bind(lng)
            .execute(pool)
            .await?;
        }
    }

    tracing::info!(count = quests.len(), "quests seeded");
    Ok(())
}
