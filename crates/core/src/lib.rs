//! Find a person in a video from a single reference photo.
//!
//! Layers follow the same split everywhere: `domain` holds traits and
//! plain types, `infrastructure` holds the ONNX, ffmpeg and HTTP backed
//! implementations, and `pipeline` wires them into one search.

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_embedder;
    }
    pub mod infrastructure {
        pub mod arcface_encoder;
        pub mod execution_provider;
        pub mod math;
        pub mod onnx_face_embedder;
        pub mod onnx_yolo_detector;
    }
}

pub mod matching {
    pub mod face_matcher;
    pub mod match_record;
    pub mod reference_embedding;
}

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod reference_image;
    pub mod workflow_orchestrator;
    pub mod workflow_result;
}

pub mod sampling {
    pub mod frame_sampler;
    pub mod sample_config;
}

pub mod shared {
    pub mod constants;
    pub mod download;
    pub mod frame;
    pub mod model_resolver;
    pub mod settings;
    pub mod video_metadata;
}

pub mod source {
    pub mod domain {
        pub mod video_fetcher;
    }
    pub mod infrastructure {
        pub mod file_name;
        pub mod http_video_fetcher;
    }
    pub mod source_resolver;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
    }
}

#[cfg(test)]
mod test_support;
