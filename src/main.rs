#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    clinic_mailer::run().await
}
