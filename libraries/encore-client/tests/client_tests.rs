//! Tests for the Encore server client.
//!
//! These tests use mock servers to verify client behavior without
//! requiring a real server connection.

use encore_client::{ClientError, EncoreClient, ServerConfig};
use encore_playback::TrackKind;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn authed_client(server: &MockServer) -> EncoreClient {
    let client = EncoreClient::new(ServerConfig::with_token(server.uri(), "tok")).unwrap();
    assert!(client.is_authenticated().await);
    client
}

fn song(id: &str, name: &str, author: &str) -> serde_json::Value {
    serde_json::json!({
        "_id": id,
        "name": name,
        "thumbnail": format!("https://img/{}.jpg", id),
        "track": format!("https://cdn/{}.mp3", id),
        "author": author,
        "artist": {"_id": "u1", "firstName": "Ada", "lastName": "Lovelace", "username": "ada"}
    })
}

// =============================================================================
// Client Creation Tests
// =============================================================================

mod client_creation {
    use super::*;

    #[test]
    fn test_empty_url_rejected() {
        match EncoreClient::new(ServerConfig::new("")) {
            Err(ClientError::InvalidUrl(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected InvalidUrl error"),
        }
    }

    #[test]
    fn test_url_without_scheme_rejected() {
        match EncoreClient::new(ServerConfig::new("example.com")) {
            Err(ClientError::InvalidUrl(msg)) => assert!(msg.contains("http://")),
            _ => panic!("Expected InvalidUrl error"),
        }
    }

    #[tokio::test]
    async fn test_multiple_trailing_slashes_removed() {
        let client = EncoreClient::new(ServerConfig::new("https://example.com///")).unwrap();
        assert_eq!(client.url().await, "https://example.com");
    }

    #[tokio::test]
    async fn test_library_requires_token() {
        let client = EncoreClient::new(ServerConfig::new("https://example.com")).unwrap();
        assert!(matches!(
            client.library().await,
            Err(ClientError::AuthRequired)
        ));
    }
}

// =============================================================================
// Authentication Tests
// =============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn test_successful_login_stores_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "ada@example.com",
                "password": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "u1",
                "email": "ada@example.com",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "username": "ada",
                "likedSongs": [],
                "token": "jwt-token"
            })))
            .mount(&mock_server)
            .await;

        let client = EncoreClient::new(ServerConfig::new(mock_server.uri())).unwrap();
        assert!(!client.is_authenticated().await);

        let login = client.login("ada@example.com", "secret").await.unwrap();
        assert_eq!(login.user_id, "u1");
        assert_eq!(login.first_name, "Ada");
        assert_eq!(client.token().await.as_deref(), Some("jwt-token"));
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"error": "Invalid credentials"})),
            )
            .mount(&mock_server)
            .await;

        let client = EncoreClient::new(ServerConfig::new(mock_server.uri())).unwrap();
        let result = client.login("ada@example.com", "wrong").await;

        assert!(matches!(result, Err(ClientError::AuthFailed(_))));
        assert!(!client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_login_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Login failed"))
            .mount(&mock_server)
            .await;

        let client = EncoreClient::new(ServerConfig::new(mock_server.uri())).unwrap();
        match client.login("a@b.c", "p").await {
            Err(ClientError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("Login failed"));
            }
            other => panic!("Expected ServerError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logout_clears_token() {
        let client = EncoreClient::new(ServerConfig::with_token("https://example.com", "t")).unwrap();
        client.logout().await;
        assert!(!client.is_authenticated().await);
    }
}

// =============================================================================
// Track List Tests
// =============================================================================

mod track_lists {
    use super::*;

    #[tokio::test]
    async fn test_trending_maps_songs_to_tracks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/get/trending"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [song("s1", "First", "Band"), song("s2", "Second", "")],
                "success": true
            })))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let tracks = client.library().await.unwrap().client().trending().await.unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "s1");
        assert_eq!(tracks[0].title, "First");
        assert_eq!(tracks[0].artist, "Band");
        assert_eq!(tracks[0].resource, "https://cdn/s1.mp3");
        assert_eq!(tracks[0].thumbnail.as_deref(), Some("https://img/s1.jpg"));
        assert_eq!(tracks[1].artist, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_my_songs_and_liked() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/get/mysongs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [song("m1", "Mine", "Me")]})),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/song/liked"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let library = client.library().await.unwrap();

        assert_eq!(library.client().my_songs().await.unwrap()[0].id, "m1");
        assert!(library.client().liked_songs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_encodes_name() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/get/songname/love%20song"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [song("s9", "Love Song", "X")]})),
            )
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let tracks = client
            .library()
            .await
            .unwrap()
            .client()
            .search_songs("love song")
            .await
            .unwrap();
        assert_eq!(tracks[0].title, "Love Song");
    }

    #[tokio::test]
    async fn test_playlist_songs_in_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/playlist/get/playlist/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "p1",
                "name": "Road trip",
                "owner": {"_id": "u1", "firstName": "Ada"},
                "songs": [song("s2", "B", "x"), song("s1", "A", "x")]
            })))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let tracks = client.library().await.unwrap().client().playlist("p1").await.unwrap();
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
    }

    #[tokio::test]
    async fn test_my_playlists() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/playlist/get/me"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"_id": "p1", "name": "Road trip", "owner": "u1", "songs": [song("s1", "A", "x")]},
                    {"_id": "p2", "name": "Empty", "owner": "u1", "thumbnail": "https://img/p2.jpg", "songs": []}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let playlists = client.library().await.unwrap().client().my_playlists().await.unwrap();
        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[0].name, "Road trip");
        assert_eq!(playlists[0].songs.len(), 1);
        assert_eq!(playlists[1].id, "p2");
        assert!(playlists[1].songs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_playlist() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/playlist/get/playlist/nope"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"err": "Playlist not found"})),
            )
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let result = client.library().await.unwrap().client().playlist("nope").await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_audiobooks_with_chapters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/audiobook/get/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "_id": "b1",
                    "name": "Long Book",
                    "author": "Writer",
                    "narrator": "Voice",
                    "thumbnail": "https://img/b1.jpg",
                    "audioFile": "https://cdn/b1.mp3",
                    "duration": 7200,
                    "description": "d",
                    "genre": "g",
                    "chapters": [
                        {"name": "Intro", "startTime": 0, "endTime": 60},
                        {"name": "Part 1", "startTime": 60, "endTime": 7200}
                    ]
                }]
            })))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let books = client.library().await.unwrap().client().audiobooks().await.unwrap();
        assert_eq!(books.len(), 1);

        let tracks = books[0].chapter_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].start_offset, Some(Duration::from_secs(60)));
        assert_eq!(tracks[1].kind, TrackKind::Audiobook);
        assert_eq!(tracks[1].artist, "Writer");
    }

    #[tokio::test]
    async fn test_expired_token_is_auth_required() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/get/trending"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let result = client.library().await.unwrap().client().trending().await;
        assert!(matches!(result, Err(ClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_malformed_list_is_parse_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/liked"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let result = client.library().await.unwrap().client().liked_songs().await;
        assert!(matches!(result, Err(ClientError::ParseError(_))));
    }
}

// =============================================================================
// Likes, Playlists and Progress
// =============================================================================

mod updates {
    use super::*;

    #[tokio::test]
    async fn test_is_liked() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/song/is-liked/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"isLiked": true})))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        assert!(client.library().await.unwrap().client().is_liked("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_liked_posts_song_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/song/like"))
            .and(body_json(serde_json::json!({"songId": "s1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/song/unlike"))
            .and(body_json(serde_json::json!({"songId": "s1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let library = client.library().await.unwrap();
        library.client().set_liked("s1", true).await.unwrap();
        library.client().set_liked("s1", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_like_unknown_song() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/song/like"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "Song not found"})))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let result = client.library().await.unwrap().client().like("ghost").await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_to_playlist() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/playlist/add/song"))
            .and(body_json(serde_json::json!({"playlistId": "p1", "songId": "s1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"_id": "p1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        client
            .library()
            .await
            .unwrap()
            .client()
            .add_to_playlist("p1", "s1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_to_playlist_forbidden() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/playlist/add/song"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Not authorized to modify this playlist"))
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        let result = client.library().await.unwrap().client().add_to_playlist("p1", "s1").await;
        match result {
            Err(ClientError::ServerError { status, .. }) => assert_eq!(status, 403),
            other => panic!("Expected ServerError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_audiobook_progress_in_seconds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/audiobook/progress/b1"))
            .and(body_json(serde_json::json!({"progress": 90.5})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "progress": 90.5})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authed_client(&mock_server).await;
        client
            .library()
            .await
            .unwrap()
            .client()
            .update_audiobook_progress("b1", Duration::from_millis(90_500))
            .await
            .unwrap();
    }
}
