pub mod application;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::checkout_service::CheckoutService;
use application::fulfillment_service::FulfillmentService;
use infrastructure::gateway::HttpPaymentGateway;
use infrastructure::order_repo::DieselOrderRepository;
use infrastructure::session_store::InMemorySessionStore;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Concrete service types wired into the HTTP layer.
pub type AppCheckoutService =
    CheckoutService<HttpPaymentGateway, DieselOrderRepository, InMemorySessionStore>;
pub type AppFulfillmentService = FulfillmentService<HttpPaymentGateway, DieselOrderRepository>;

/// Bearer token required on admin endpoints.
#[derive(Clone)]
pub struct AdminToken(pub String);

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::checkout::open_checkout,
        handlers::checkout::capture_checkout,
        handlers::checkout::create_order_direct,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::admin_update_order,
        handlers::orders::add_tracking,
        handlers::orders::mark_delivered,
    ),
    tags(
        (name = "checkout", description = "Checkout and payment capture"),
        (name = "orders", description = "Order administration and fulfillment"),
    )
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    checkout: AppCheckoutService,
    fulfillment: AppFulfillmentService,
    admin_token: AdminToken,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let checkout = web::Data::new(checkout);
    let fulfillment = web::Data::new(fulfillment);
    let admin_token = web::Data::new(admin_token);

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(checkout.clone())
            .app_data(fulfillment.clone())
            .app_data(admin_token.clone())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .service(
                web::scope("/checkout")
                    .route("", web::post().to(handlers::checkout::open_checkout))
                    .route(
                        "/{gateway_order_id}/capture",
                        web::post().to(handlers::checkout::capture_checkout),
                    ),
            )
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::checkout::create_order_direct))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::patch().to(handlers::orders::admin_update_order))
                    .route(
                        "/{id}/tracking",
                        web::post().to(handlers::orders::add_tracking),
                    )
                    .route(
                        "/{id}/delivered",
                        web::post().to(handlers::orders::mark_delivered),
                    ),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
