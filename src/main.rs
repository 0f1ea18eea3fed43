#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    fpit_invitaciones::run().await
}
