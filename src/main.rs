#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    playlist_api::rocket()
}
