#[rocket::launch]
fn rocket() -> _ {
    let rocket = asset_server::rocket();
    log::info!("starting asset server");
    rocket
}
