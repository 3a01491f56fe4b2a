mod subscribe;

pub use subscribe::{
    SubscribeError, SubscribeOutcome, SubscribeRequest, SubscribeStage, SubscribeUseCase,
};
