use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use order_ledger::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{address::AddressType, order::Model as OrderModel},
    events,
    services::{
        billing::{NewAddress, NewBillingProfile},
        checkout::CheckoutOutcome,
    },
    AppServices,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "order-ledger", version, about = "Manage cart-backed orders")]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create a billing profile
    NewProfile {
        #[arg(long)]
        email: String,
    },
    /// Create a cart with the given total
    NewCart {
        #[arg(long, default_value = "0")]
        total: Decimal,
    },
    /// Create an address, optionally owned by a billing profile
    NewAddress {
        #[arg(long)]
        billing_profile: Option<Uuid>,
        #[arg(long, help = "billing or shipping")]
        kind: AddressType,
        #[arg(long)]
        line1: String,
        #[arg(long)]
        line2: Option<String>,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        postal_code: String,
        #[arg(long)]
        country: String,
    },
    /// Get or create the active order for a billing profile and cart
    Checkout {
        #[arg(long)]
        billing_profile: Uuid,
        #[arg(long)]
        cart: Uuid,
    },
    /// Change a cart's total and resynchronise its order
    SetCartTotal {
        #[arg(long)]
        cart: Uuid,
        #[arg(long)]
        total: Decimal,
    },
    /// Attach shipping and/or billing addresses to an order
    AttachAddresses {
        #[arg(long, help = "Order UUID or order id slug")]
        order: String,
        #[arg(long)]
        shipping: Option<Uuid>,
        #[arg(long)]
        billing: Option<Uuid>,
    },
    /// Mark an order paid if its checkout details are complete
    MarkPaid {
        #[arg(long, help = "Order UUID or order id slug")]
        order: String,
    },
    /// Show an order
    Show {
        #[arg(long, help = "Order UUID or order id slug")]
        order: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    let result = run(&context, cli.command, cli.json).await;
    context.shutdown().await;
    result
}

async fn run(context: &CliContext, command: Commands, json: bool) -> Result<()> {
    let services = &context.services;

    match command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::NewProfile { email } => {
            let profile = services
                .billing
                .create_profile(NewBillingProfile { email })
                .await
                .context("failed to create billing profile")?;
            if json {
                print_json(&profile)?;
            } else {
                println!("Billing profile {} <{}>", profile.id, profile.email);
            }
        }
        Commands::NewCart { total } => {
            let cart = services
                .carts
                .create_cart(total)
                .await
                .context("failed to create cart")?;
            if json {
                print_json(&cart)?;
            } else {
                println!("Cart {} • total {}", cart.id, cart.total);
            }
        }
        Commands::NewAddress {
            billing_profile,
            kind,
            line1,
            line2,
            city,
            state,
            postal_code,
            country,
        } => {
            let address = services
                .billing
                .create_address(NewAddress {
                    billing_profile_id: billing_profile,
                    address_type: kind,
                    line1,
                    line2,
                    city,
                    state,
                    postal_code,
                    country,
                })
                .await
                .context("failed to create address")?;
            if json {
                print_json(&address)?;
            } else {
                println!(
                    "Address {} ({}) • {}, {}",
                    address.id, address.address_type, address.line1, address.city
                );
            }
        }
        Commands::Checkout {
            billing_profile,
            cart,
        } => {
            let (order, created) = services
                .checkout
                .begin(billing_profile, cart)
                .await
                .context("failed to acquire order")?;
            if json {
                print_json(&serde_json::json!({ "order": order, "created": created }))?;
            } else {
                println!("{} order:", if created { "Created" } else { "Reusing" });
                render_order(&order);
            }
        }
        Commands::SetCartTotal { cart, total } => {
            let (cart, order) = services
                .carts
                .update_total(cart, total)
                .await
                .context("failed to update cart total")?;
            if json {
                print_json(&serde_json::json!({ "cart": cart, "order": order }))?;
            } else {
                println!("Cart {} • total {}", cart.id, cart.total);
                match order {
                    Some(order) => render_order(&order),
                    None => println!("No single order tracks this cart; nothing recomputed"),
                }
            }
        }
        Commands::AttachAddresses {
            order,
            shipping,
            billing,
        } => {
            if shipping.is_none() && billing.is_none() {
                return Err(anyhow!("pass --shipping and/or --billing"));
            }
            let id = resolve_order(context, &order).await?.id;
            let order = services
                .checkout
                .attach_addresses(id, shipping, billing)
                .await
                .context("failed to attach addresses")?;
            if json {
                print_json(&order)?;
            } else {
                render_order(&order);
            }
        }
        Commands::MarkPaid { order } => {
            let id = resolve_order(context, &order).await?.id;
            let outcome = services
                .checkout
                .finalize(id)
                .await
                .context("failed to mark order paid")?;
            match outcome {
                CheckoutOutcome::Paid(order) => {
                    if json {
                        print_json(&order)?;
                    } else {
                        println!("Paid:");
                        render_order(&order);
                    }
                }
                CheckoutOutcome::Incomplete { order, missing } => {
                    if json {
                        print_json(&serde_json::json!({ "order": order, "missing": missing }))?;
                    } else {
                        println!("Not paid; missing {}", missing.join(", "));
                        render_order(&order);
                    }
                }
            }
        }
        Commands::Show { order } => {
            let order = resolve_order(context, &order).await?;
            if json {
                print_json(&order)?;
            } else {
                render_order(&order);
            }
        }
    }

    Ok(())
}

struct CliContext {
    db: Arc<DbPool>,
    services: AppServices,
    event_loop: JoinHandle<usize>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        if config.auto_migrate {
            db::run_migrations(&db)
                .await
                .context("failed to run migrations")?;
        }

        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        let event_loop = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db.clone(), Some(Arc::new(event_sender)), &config);

        Ok(Self {
            db,
            services,
            event_loop,
        })
    }

    /// Drops every event sender so the event loop drains and exits
    async fn shutdown(self) {
        let Self {
            services,
            event_loop,
            ..
        } = self;
        drop(services);
        let _ = event_loop.await;
    }
}

async fn resolve_order(context: &CliContext, reference: &str) -> Result<OrderModel> {
    let ledger = &context.services.ledger;
    let found = match Uuid::parse_str(reference) {
        Ok(id) => ledger.get_order(id).await?,
        Err(_) => ledger.find_by_order_id(reference).await?,
    };
    found.ok_or_else(|| anyhow!("order '{}' not found", reference))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_order(order: &OrderModel) {
    println!(
        "- Order {} • status {} • {} • total {} (shipping {})",
        order,
        order.status,
        if order.active { "active" } else { "inactive" },
        order.total,
        order.shipping_total
    );
}
