use super::handler;
use crate::application_port::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let session_status = warp::get()
        .and(warp::path!("session"))
        .and(with(server.session_validator.clone()))
        .and_then(handler::session_status);

    let sign_in = warp::post()
        .and(warp::path!("session"))
        .and(warp::body::json())
        .and(with(server.clone()))
        .and_then(handler::sign_in);

    let sign_out = warp::delete()
        .and(warp::path!("session"))
        .and(with(server.clone()))
        .and_then(handler::sign_out);

    let bookmarks = warp::get()
        .and(warp::path!("bookmarks"))
        .and(warp::query::<handler::FetchQuery>())
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::list_bookmarks);

    let records = warp::get()
        .and(warp::path!("bookmarks" / "records"))
        .and(warp::query::<handler::FetchQuery>())
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::list_records);

    let snapshot = warp::get()
        .and(warp::path!("bookmarks" / "snapshot"))
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::bookmark_snapshot);

    let more = warp::post()
        .and(warp::path!("bookmarks" / "more"))
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::load_more);

    let refresh = warp::post()
        .and(warp::path!("bookmarks" / "refresh"))
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::refresh_bookmarks);

    let toggle = warp::post()
        .and(warp::path!("bookmarks" / String / "toggle"))
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::toggle_bookmark);

    let clear = warp::delete()
        .and(warp::path!("bookmarks"))
        .and(warp::body::json())
        .and(with(server.bookmark_service.clone()))
        .and_then(handler::clear_bookmarks);

    let events = warp::get()
        .and(warp::path!("bookmarks" / "events"))
        .and(with(server.bookmark_service.clone()))
        .map(|service: Arc<dyn BookmarkService>| handler::membership_events(service));

    session_status
        .or(sign_in)
        .or(sign_out)
        .or(bookmarks)
        .or(records)
        .or(snapshot)
        .or(more)
        .or(refresh)
        .or(toggle)
        .or(clear)
        .or(events)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
