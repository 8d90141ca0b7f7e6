//! Wire Module Tests
//!
//! ## Test Scopes
//! - **Schemas**: Field names on the wire and lossless decoding of every message type.
//! - **Framing**: Delimiting, truncated frames, malformed payloads.
//! - **Connections**: Loopback exchange and deadline enforcement.

#[cfg(test)]
mod tests {
    use crate::model::factorization::ModelParameters;
    use crate::wire::codec::{JsonConnection, WireError, read_message, write_message};
    use crate::wire::protocol::*;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn sample_sync_request() -> SyncRequest {
        SyncRequest {
            master_ip: "10.0.0.1".to_string(),
            movie_genre_ids: vec![vec![0, 2], vec![], vec![1]],
            model_config: ModelParameters {
                num_features: 2,
                epochs: 10,
                learning_rate: 0.001,
                regularization: 0.0001,
                r: None,
                p: None,
                q: vec![vec![0.5, -0.25], vec![1.0, 0.0], vec![0.125, 3.0]],
            },
        }
    }

    fn sample_batch() -> BatchRequest {
        BatchRequest {
            user_id: 42,
            user_ratings: vec![0.0, 4.0, 0.0],
            start_movie_id: 3,
            end_movie_id: 6,
            quantity: 5,
            genre_ids: vec![2, 5],
            user_factors: vec![0.001, -0.002],
        }
    }

    // ============================================================
    // SCHEMA TESTS
    // ============================================================

    #[test]
    fn test_batch_request_wire_names() {
        let json = serde_json::to_value(sample_batch()).unwrap();

        assert_eq!(json["userId"], 42);
        assert_eq!(json["startMovieId"], 3);
        assert_eq!(json["endMovieId"], 6);
        assert_eq!(json["genreIds"], serde_json::json!([2, 5]));
        assert!(json.get("userRatings").is_some());
        assert!(json.get("userFactors").is_some());
    }

    #[test]
    fn test_factor_messages_wire_names() {
        let partial = serde_json::to_value(PartialUserFactors {
            user_id: 1,
            weighted_grad: vec![0.5],
            count: 3,
        })
        .unwrap();
        let global = serde_json::to_value(GlobalUserFactors {
            user_id: 1,
            user_latent_factors: vec![0.5],
        })
        .unwrap();

        assert_eq!(partial["weightedGrad"], serde_json::json!([0.5]));
        assert_eq!(partial["count"], 3);
        assert_eq!(global["userLatentFactors"], serde_json::json!([0.5]));
    }

    #[test]
    fn test_sync_request_omits_ratings_and_user_factors() {
        let json = serde_json::to_value(sample_sync_request()).unwrap();

        assert_eq!(json["masterIp"], "10.0.0.1");
        assert!(json["modelConfig"]["R"].is_null());
        assert!(json["modelConfig"]["P"].is_null());
        assert_eq!(json["modelConfig"]["Q"][2][1], 3.0);
    }

    #[test]
    fn test_sync_request_accepts_missing_optional_matrices() {
        let raw = r#"{"masterIp":"m","movieGenreIds":[[1]],
            "modelConfig":{"numFeatures":1,"epochs":1,"learningRate":0.1,
            "regularization":0.0,"Q":[[1.0]]}}"#;

        let request: SyncRequest = serde_json::from_str(raw).unwrap();

        assert!(request.model_config.r.is_none());
        assert_eq!(request.model_config.q, vec![vec![1.0]]);
    }

    #[tokio::test]
    async fn test_every_schema_survives_the_wire() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (_, mut writer) = tokio::io::split(client);
        let (reader, _) = tokio::io::split(server);
        let mut reader = BufReader::new(reader);

        let sync = sample_sync_request();
        let status = SyncResponse { status: SYNC_STATUS_OK };
        let batch = sample_batch();
        let partial = PartialUserFactors {
            user_id: 42,
            weighted_grad: vec![0.1, -0.3],
            count: 7,
        };
        let global = GlobalUserFactors {
            user_id: 42,
            user_latent_factors: vec![0.2, 0.4],
        };
        let result = PartialRecResponse {
            predictions: vec![
                Prediction { movie_id: 4, rating: 3.75 },
                Prediction { movie_id: 5, rating: -0.5 },
            ],
            sum: 3.25,
            max: 3.75,
            min: -0.5,
            count: 2,
        };

        write_message(&mut writer, &sync).await.unwrap();
        write_message(&mut writer, &status).await.unwrap();
        write_message(&mut writer, &batch).await.unwrap();
        write_message(&mut writer, &partial).await.unwrap();
        write_message(&mut writer, &global).await.unwrap();
        write_message(&mut writer, &result).await.unwrap();

        assert_eq!(read_message::<_, SyncRequest>(&mut reader).await.unwrap(), sync);
        assert_eq!(read_message::<_, SyncResponse>(&mut reader).await.unwrap(), status);
        assert_eq!(read_message::<_, BatchRequest>(&mut reader).await.unwrap(), batch);
        assert_eq!(
            read_message::<_, PartialUserFactors>(&mut reader).await.unwrap(),
            partial
        );
        assert_eq!(
            read_message::<_, GlobalUserFactors>(&mut reader).await.unwrap(),
            global
        );
        assert_eq!(
            read_message::<_, PartialRecResponse>(&mut reader).await.unwrap(),
            result
        );
    }

    // ============================================================
    // FRAMING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_frame_is_json_plus_single_newline() {
        let mut buffer: Vec<u8> = Vec::new();

        write_message(&mut buffer, &SyncResponse { status: 0 })
            .await
            .unwrap();

        assert_eq!(buffer, b"{\"status\":0}\n".to_vec());
    }

    #[tokio::test]
    async fn test_read_from_empty_stream_reports_closed() {
        let mut reader: &[u8] = b"";

        let result = read_message::<_, SyncResponse>(&mut reader).await;

        assert!(matches!(result, Err(WireError::Closed)));
    }

    #[tokio::test]
    async fn test_truncated_frame_reports_closed() {
        let mut reader: &[u8] = b"{\"status\":0}";

        let result = read_message::<_, SyncResponse>(&mut reader).await;

        assert!(matches!(result, Err(WireError::Closed)));
    }

    #[tokio::test]
    async fn test_malformed_frame_reports_decode_error() {
        let mut reader: &[u8] = b"{\"status\":\"zero\"}\n{\"status\":1}\n";

        let first = read_message::<_, SyncResponse>(&mut reader).await;
        let second = read_message::<_, SyncResponse>(&mut reader).await;

        assert!(matches!(first, Err(WireError::Decode(_))));
        assert_eq!(second.unwrap().status, 1, "Next frame is still readable");
    }

    // ============================================================
    // CONNECTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_connection_request_reply_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = JsonConnection::accepted(stream, EXCHANGE_DEADLINE);
            let request: SyncRequest = conn.receive().await.unwrap();
            conn.send(&SyncResponse {
                status: request.movie_genre_ids.len() as i32,
            })
            .await
            .unwrap();
        });

        let mut conn = JsonConnection::connect(addr, EXCHANGE_DEADLINE).await.unwrap();
        conn.send(&sample_sync_request()).await.unwrap();
        let response: SyncResponse = conn.receive().await.unwrap();

        assert_eq!(response.status, 3);
        assert_eq!(conn.peer_addr(), Some(addr));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_peer_hits_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = stream.shutdown().await;
        });

        let mut conn = JsonConnection::connect(addr, Duration::from_millis(100))
            .await
            .unwrap();
        let result = conn.receive::<SyncResponse>().await;

        assert!(matches!(result, Err(WireError::DeadlineExceeded)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_restarted_deadline_outlives_the_original_budget() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = JsonConnection::accepted(stream, EXCHANGE_DEADLINE);
            tokio::time::sleep(Duration::from_millis(300)).await;
            conn.send(&SyncResponse {
                status: SYNC_STATUS_OK,
            })
            .await
            .unwrap();
        });

        let mut conn = JsonConnection::connect(addr, Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        conn.restart_deadline(Duration::from_secs(5));
        let response: SyncResponse = conn.receive().await.unwrap();

        assert_eq!(response.status, SYNC_STATUS_OK);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = JsonConnection::connect(addr, EXCHANGE_DEADLINE).await;

        assert!(matches!(result, Err(WireError::Connect { .. })));
    }
}
