//! Face censoring for videos: detect faces, optionally match them against
//! reference images, blur/pixelate/mask the selected ones and re-encode the
//! video with its audio intact. Jobs run in the background through
//! [`jobs::job_manager::JobManager`].

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod face_box;
    pub mod frame;
    pub mod model_resolver;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod detection_model;
        pub mod face_capability;
        pub mod face_encoding;
        pub mod reference_set;
    }
    pub mod infrastructure;
}

pub mod censoring {
    pub mod domain {
        pub mod censor_type;
        pub mod frame_censor;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod image_reader;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
        pub mod image_file_reader;
    }
}

pub mod pipeline {
    pub mod domain {
        pub mod censor_mode;
        pub mod face_selector;
        pub mod frame_analyzer;
    }
    pub mod infrastructure {
        pub mod threaded_pipeline_executor;
    }
    pub mod censor_video_use_case;
    pub mod pipeline_executor;
}

pub mod jobs {
    pub mod domain {
        pub mod job;
        pub mod job_event;
        pub mod job_request;
        pub mod video_processor;
    }
    pub mod infrastructure;
    pub mod job_manager;
    pub mod job_store;
}

#[cfg(test)]
pub(crate) mod testing;
