#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    catalogue_export_server::run().await
}
