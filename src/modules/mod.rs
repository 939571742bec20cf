pub mod hand_landmark_client;
