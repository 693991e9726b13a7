use checkout_service::application::checkout_service::{CheckoutService, ReturnUrls};
use checkout_service::application::fulfillment_service::FulfillmentService;
use checkout_service::infrastructure::gateway::{GatewayConfig, HttpPaymentGateway};
use checkout_service::infrastructure::order_repo::DieselOrderRepository;
use checkout_service::infrastructure::session_store::InMemorySessionStore;
use checkout_service::{build_server, create_pool, run_migrations, AdminToken};
use dotenvy::dotenv;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a valid number");

    let gateway = HttpPaymentGateway::new(GatewayConfig {
        base_url: env::var("GATEWAY_BASE_URL").expect("GATEWAY_BASE_URL must be set"),
        client_id: env::var("GATEWAY_CLIENT_ID").expect("GATEWAY_CLIENT_ID must be set"),
        client_secret: env::var("GATEWAY_CLIENT_SECRET").expect("GATEWAY_CLIENT_SECRET must be set"),
    });
    let urls = ReturnUrls {
        return_url: env::var("CHECKOUT_RETURN_URL").expect("CHECKOUT_RETURN_URL must be set"),
        cancel_url: env::var("CHECKOUT_CANCEL_URL").expect("CHECKOUT_CANCEL_URL must be set"),
    };
    let admin_token = AdminToken(env::var("ADMIN_API_TOKEN").expect("ADMIN_API_TOKEN must be set"));

    let pool = create_pool(&database_url);
    run_migrations(&pool);

    let repo = DieselOrderRepository::new(pool.clone());
    let sessions = InMemorySessionStore::new();
    let checkout = CheckoutService::new(gateway.clone(), repo.clone(), sessions, urls);
    let fulfillment = FulfillmentService::new(gateway, repo);

    log::info!("Starting server at http://{}:{}", host, port);

    build_server(checkout, fulfillment, admin_token, &host, port)?.await
}
