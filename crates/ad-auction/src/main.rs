#[tokio::main]
async fn main() {
    ad_auction::start(std::env::args()).await;
}
